//! Puzzle - streaming page composition server.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{ColorChoice, Parser};

use puzzle::cli::{self, Cli, Commands, common::Site};
use puzzle::config::{PuzzleConfig, find_config_file};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    puzzle::core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    puzzle::logger::set_verbose(cli.verbose);

    let path = find_config_file(&cli.config)
        .ok_or_else(|| anyhow!("config file `{}` not found", cli.config.display()))?;
    let mut config = PuzzleConfig::load(&path)?;
    if let Commands::Serve { interface, port } = &cli.command {
        config.apply_serve_options(*interface, *port);
    }

    let site = Arc::new(Site::load(&config)?);
    let runtime = cli::common::runtime(config.serve.workers)?;

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve_site(&config, site, &runtime),
        Commands::Render { url, cookies } => runtime.block_on(cli::render::render_url(&site, url, cookies)),
        Commands::Inspect { page } => runtime.block_on(cli::inspect::inspect_page(&site, page)),
    }
}
