//! Page compilation and response composition.
//!
//! [`Template::compile`] turns page source plus the current gateway table
//! into an immutable [`CompiledHandler`]. The handler answers requests in
//! one of two shapes chosen at compile time:
//!
//! - **buffered**: no chunked fragments, one body write
//! - **streaming**: a first flush with every container in place, then one
//!   chunk per fragment in completion order
//!
//! # Module Structure
//!
//! - `handler` - per-request composition for both strategies
//! - `replace` - the waited-fragment step shared by both
//! - `merge` - status, header and cookie propagation
//! - `markup` - scripts and wrappers written around fragments
//! - `sink` - response output abstraction

mod handler;
mod markup;
mod merge;
mod replace;
mod sink;


pub use handler::{CompiledHandler, FragmentSummary, Strategy};
pub use merge::{is_permanent_redirect, is_redirect};
pub use sink::{BufferedSink, ResponseHead, ResponseSink};

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::dom::{Document, Node};
use crate::fragment::{
    Classification, DiscoverError, Discovery, FragmentIdentity, FragmentReference, ReplaceKind,
    StaticContent, discover, rewrite,
};
use crate::gateway::{AssetLocation, FragmentSource, GatewayMap};
use crate::template::{self, TemplateCompileError};
use crate::{debug, log};

const TEMPLATE_TAG: &str = "template";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("template `{0}` has no content")]
    MissingTemplate(String),

    #[error(transparent)]
    MultiplePrimary(#[from] DiscoverError),

    #[error(transparent)]
    Template(#[from] TemplateCompileError),

    #[error("static fragment `{fragment}` unavailable (status {status})")]
    StaticFragmentUnavailable { fragment: FragmentIdentity, status: u16 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Tag containers with their classification and log the table.
    pub debug: bool,
    /// Fail when a static fragment answers with a server error.
    pub precompile: bool,
}

/// Page-wide assets injected into `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAssets {
    /// Browser runtime bootstrap script.
    pub library_script: Option<String>,
    pub stylesheets: Vec<String>,
}

/// Page source as authored.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    source: String,
    assets: PageAssets,
}

impl Template {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            assets: PageAssets::default(),
        }
    }

    pub fn with_assets(mut self, assets: PageAssets) -> Self {
        self.assets = assets;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body of the `<template>` element, or the whole source without one.
    fn parse(&self) -> Result<Document, ComposeError> {
        if self.source.trim().is_empty() {
            return Err(ComposeError::MissingTemplate(self.name.clone()));
        }
        let doc = Document::parse(&self.source);
        let Some(el) = doc.find(TEMPLATE_TAG) else {
            return Ok(doc);
        };
        let blank = el.children.iter().all(|node| match node {
            Node::Text(text) => text.trim().is_empty(),
            _ => false,
        });
        if blank {
            return Err(ComposeError::MissingTemplate(self.name.clone()));
        }
        Ok(Document {
            children: el.children.clone(),
        })
    }

    /// Referenced identities in declaration order, without duplicates.
    ///
    /// Needs no gateway table, so it also checks that the page has a body.
    pub fn references(&self) -> Result<Vec<FragmentIdentity>, ComposeError> {
        let doc = self.parse()?;
        let mut out: Vec<FragmentIdentity> = Vec::new();
        doc.visit(&mut |el, in_head| {
            if let Some(reference) = FragmentReference::from_element(el, in_head)
                && !out.contains(&reference.identity)
            {
                out.push(reference.identity);
            }
        });
        Ok(out)
    }

    /// Gateway name to referenced fragment names, unconfigured ones included.
    pub fn dependencies(&self, gateways: &GatewayMap) -> Result<BTreeMap<String, Vec<String>>, ComposeError> {
        let doc = self.parse()?;
        let discovery = discover(&doc, gateways, &BTreeMap::new())?;
        let mut deps = discovery.dependencies();
        for identity in discovery.missing {
            deps.entry(identity.gateway).or_default().push(identity.name);
        }
        Ok(deps)
    }

    /// Compile against one gateway snapshot and one cookie combination.
    pub async fn compile(
        &self,
        gateways: &GatewayMap,
        cookies: &BTreeMap<String, String>,
        options: CompileOptions,
    ) -> Result<CompiledHandler, ComposeError> {
        let mut doc = self.parse()?;
        let discovery = discover(&doc, gateways, cookies)?;

        let statics = fetch_statics(&discovery, gateways, options.precompile).await?;
        if !discovery.fragments.is_empty() {
            self.inject_head_assets(&mut doc, &discovery);
        }
        rewrite(&mut doc, &discovery, &statics, options.debug);

        if options.debug {
            log!("compile"; "{} fragments:", self.name);
            for f in &discovery.fragments {
                log!("compile"; "  {:<28} {:<14} v{} [{}]", f.identity.to_string(), f.classification.name(), f.version, f.partials.join(", "));
            }
            for identity in &discovery.missing {
                log!("compile"; "  {:<28} {:<14}", identity.to_string(), "not found");
            }
        }

        let html = markup::restore_scripts(&doc.render());
        let first_flush = template::compile(&html)?;

        let mut waited = Vec::new();
        let mut chunked = Vec::new();
        let mut placeholders = Vec::new();
        let mut sources: FxHashMap<String, Arc<dyn FragmentSource>> = FxHashMap::default();
        let mut body_end = String::new();
        let mut summary = Vec::with_capacity(discovery.fragments.len());

        for f in &discovery.fragments {
            let set = f.replace_set();
            if set.items_of(ReplaceKind::Placeholder).next().is_some() {
                placeholders.push(set.clone());
            }
            match f.classification {
                Classification::Primary | Classification::Waited => waited.push(set),
                Classification::Chunked => chunked.push(set),
                Classification::Static | Classification::ClientAsync(_) => {}
            }

            if let Some(gateway) = gateways.get(&f.identity.gateway) {
                sources
                    .entry(gateway.name.clone())
                    .or_insert_with(|| Arc::clone(&gateway.source));
            }
            for asset in f.config.assets_at(AssetLocation::BodyEnd) {
                body_end.push_str(&asset.markup());
            }
            summary.push(FragmentSummary {
                identity: f.identity.clone(),
                classification: f.classification,
                version: f.version.clone(),
                partials: f.partials.clone(),
            });
        }

        let strategy = if chunked.is_empty() {
            Strategy::Buffered
        } else {
            Strategy::Streaming
        };
        log!("compile"; "{}: {} waited, {} chunked, {} static ({})", self.name, waited.len(), chunked.len(), statics.len(), strategy.name());

        Ok(CompiledHandler {
            name: self.name.clone(),
            first_flush,
            waited,
            chunked,
            placeholders,
            body_end,
            sources,
            strategy,
            summary,
        })
    }

    fn inject_head_assets(&self, doc: &mut Document, discovery: &Discovery) {
        let mut assets: Vec<String> = Vec::new();
        if let Some(src) = &self.assets.library_script {
            assets.push(markup::library_script(src));
        }
        assets.extend(self.assets.stylesheets.iter().map(|href| markup::stylesheet(href)));
        for f in &discovery.fragments {
            for asset in f.config.assets_at(AssetLocation::Head) {
                let html = asset.markup();
                if !assets.contains(&html) {
                    assets.push(html);
                }
            }
        }
        if assets.is_empty() {
            return;
        }

        let nodes = assets.into_iter().map(Node::Raw);
        match doc.find_mut("head") {
            Some(head) => head.children.extend(nodes),
            None => {
                debug!("compile"; "{} has no <head>, assets go first", self.name);
                doc.children.splice(0..0, nodes);
            }
        }
    }
}

/// Fetch every static fragment once, concurrently.
///
/// Static content cannot depend on a request, so expressions see neither
/// bindings nor `req`.
async fn fetch_statics(
    discovery: &Discovery,
    gateways: &GatewayMap,
    precompile: bool,
) -> Result<StaticContent, ComposeError> {
    let fetches = discovery
        .fragments
        .iter()
        .filter(|f| f.classification == Classification::Static)
        .map(|f| {
            let set = f.replace_set();
            let source = gateways.get(&f.identity.gateway).map(|g| Arc::clone(&g.source));
            let request = replace::fetch_request(&set, replace::forwarded(&set, &Value::Null, &Value::Null), &Value::Null);
            async move { (set.fragment, replace::spawn_content(source, request).await) }
        });

    let mut statics = StaticContent::default();
    for (identity, response) in join_all(fetches).await {
        if response.status >= 500 {
            if precompile {
                return Err(ComposeError::StaticFragmentUnavailable {
                    fragment: identity,
                    status: response.status,
                });
            }
            log!("compile"; "static fragment {} unavailable (status {})", identity, response.status);
            continue;
        }
        statics.insert(identity, response);
    }
    Ok(statics)
}
