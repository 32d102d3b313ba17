//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Puzzle page composition server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: puzzle.toml)
    #[arg(short = 'C', long, default_value = "puzzle.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the configured pages over HTTP
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compose one request and print the response
    #[command(visible_alias = "r")]
    Render {
        /// Request target, e.g. `/product?id=1`
        url: String,

        /// Request cookie, may repeat
        #[arg(long = "cookie", value_name = "NAME=VALUE")]
        cookies: Vec<String>,
    },

    /// Print how a page's fragments are classified
    #[command(visible_alias = "i")]
    Inspect {
        /// Page name
        page: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "puzzle", "-C", "site/puzzle.toml", "render", "/product", "--cookie", "a=1", "--cookie", "b=2",
        ]);
        assert_eq!(cli.config, PathBuf::from("site/puzzle.toml"));
        let Commands::Render { url, cookies } = cli.command else {
            panic!("expected render");
        };
        assert_eq!(url, "/product");
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["puzzle", "serve", "--port", "8080", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { interface: None, port: Some(8080) }));
    }
}
