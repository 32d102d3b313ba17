//! Common utilities shared across CLI commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::config::PuzzleConfig;
use crate::log;
use crate::page::{Page, StaticBindings};

/// Every configured page, routed by url.
pub struct Site {
    pages: Vec<Arc<Page>>,
    urls: FxHashMap<String, usize>,
    precompile: Vec<usize>,
}

impl Site {
    /// Build one page per `[[page]]` entry over a shared registry.
    pub fn load(config: &PuzzleConfig) -> Result<Self> {
        let registry = Arc::new(config.registry());
        let mut site = Self {
            pages: Vec::with_capacity(config.pages.len()),
            urls: FxHashMap::default(),
            precompile: Vec::new(),
        };

        for section in &config.pages {
            let template = config.template(section)?;
            let class = Arc::new(StaticBindings(Value::Object(section.bindings.clone())));
            let page = Page::new(template, class, Arc::clone(&registry), section.compile_options())
                .with_context(|| format!("failed to create page `{}`", section.name))?;

            let index = site.pages.len();
            site.urls.insert(section.url.clone(), index);
            if section.precompile {
                site.precompile.push(index);
            }
            site.pages.push(Arc::new(page));
        }
        Ok(site)
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    pub fn page_for_url(&self, path: &str) -> Option<&Arc<Page>> {
        self.urls.get(path).map(|&i| &self.pages[i])
    }

    pub fn page(&self, name: &str) -> Option<&Arc<Page>> {
        self.pages.iter().find(|p| p.name() == name)
    }

    /// Compile pages marked `precompile`. The first failure aborts.
    pub async fn precompile(&self) -> Result<()> {
        for &index in &self.precompile {
            let page = &self.pages[index];
            page.precompile()
                .await
                .with_context(|| format!("failed to precompile `{}`", page.name()))?;
            log!("compile"; "{} ready", page.name());
        }
        Ok(())
    }
}

/// Parse `NAME=VALUE` cookie arguments.
pub fn parse_cookie_args(args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut cookies = BTreeMap::new();
    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("invalid cookie `{arg}`, expected NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid cookie `{arg}`, name is empty");
        }
        cookies.insert(name.to_string(), value.trim().to_string());
    }
    Ok(cookies)
}

/// Multi-threaded runtime used to compose pages.
pub fn runtime(workers: usize) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.max(1))
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}
