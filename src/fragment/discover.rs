//! Fragment discovery.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::{
    Classification, DEFAULT_PARTIAL, FragmentIdentity, FragmentReference, ReplaceItem, ReplaceKind,
    ReplaceSet, Signals, classify, version_cookie,
};
use crate::dom::Document;
use crate::gateway::{FragmentConfig, GatewayMap};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoverError {
    #[error("multiple primary fragments: `{first}` and `{second}`")]
    MultiplePrimary {
        first: FragmentIdentity,
        second: FragmentIdentity,
    },
}

/// One identity after all occurrences were merged and classified.
#[derive(Debug, Clone)]
pub struct DiscoveredFragment {
    pub identity: FragmentIdentity,
    pub classification: Classification,
    pub config: FragmentConfig,
    /// Effective version after cookie negotiation.
    pub version: String,
    /// Partials in declaration order, without duplicates.
    pub partials: Vec<String>,
    /// Attributes of the first `main` occurrence, else of the first one.
    pub attributes: Vec<(String, String)>,
}

impl DiscoveredFragment {
    /// Replace set with the items its classification needs.
    pub fn replace_set(&self) -> ReplaceSet {
        let name = &self.identity.name;
        let mut items = Vec::new();
        for partial in &self.partials {
            match self.classification {
                Classification::Primary | Classification::Waited => {
                    items.push(ReplaceItem::new(ReplaceKind::Content, name, partial));
                }
                Classification::Chunked => {
                    items.push(ReplaceItem::new(ReplaceKind::ChunkedContent, name, partial));
                }
                Classification::Static | Classification::ClientAsync(_) => {}
            }
            if self.config.placeholder
                && matches!(self.classification, Classification::Chunked | Classification::ClientAsync(_))
            {
                items.push(ReplaceItem::new(ReplaceKind::Placeholder, name, partial));
            }
        }
        ReplaceSet {
            fragment: self.identity.clone(),
            classification: self.classification,
            version: self.version.clone(),
            config: self.config.clone(),
            items,
            attributes: self.attributes.clone(),
        }
    }
}

/// Result of walking a page.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Declaration order.
    pub fragments: Vec<DiscoveredFragment>,
    /// References without upstream configuration.
    pub missing: Vec<FragmentIdentity>,
}

impl Discovery {
    pub fn get(&self, identity: &FragmentIdentity) -> Option<&DiscoveredFragment> {
        self.fragments.iter().find(|f| &f.identity == identity)
    }

    pub fn primary(&self) -> Option<&DiscoveredFragment> {
        self.fragments
            .iter()
            .find(|f| f.classification == Classification::Primary)
    }

    /// Gateway name to fragment names.
    pub fn dependencies(&self) -> BTreeMap<String, Vec<String>> {
        let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for f in &self.fragments {
            deps.entry(f.identity.gateway.clone())
                .or_default()
                .push(f.identity.name.clone());
        }
        deps
    }
}

struct Pending {
    signals: Signals,
    config: FragmentConfig,
    partials: Vec<String>,
    attributes: Vec<(String, String)>,
    attributes_from_main: bool,
}

/// Walk `doc` and classify every referenced fragment identity.
///
/// `cookies` may select fragment versions (`puzzle_<name>_version`).
pub fn discover(
    doc: &Document,
    gateways: &GatewayMap,
    cookies: &BTreeMap<String, String>,
) -> Result<Discovery, DiscoverError> {
    let mut references = Vec::new();
    doc.visit(&mut |el, in_head| {
        if let Some(reference) = FragmentReference::from_element(el, in_head) {
            references.push(reference);
        }
    });

    let mut order: Vec<FragmentIdentity> = Vec::new();
    let mut pending: FxHashMap<FragmentIdentity, Pending> = FxHashMap::default();
    let mut missing: Vec<FragmentIdentity> = Vec::new();

    for reference in references {
        let config = gateways
            .get(&reference.identity.gateway)
            .and_then(|g| g.fragment(&reference.identity.name));
        let Some(config) = config else {
            if !missing.contains(&reference.identity) {
                missing.push(reference.identity);
            }
            continue;
        };

        let entry = pending.entry(reference.identity.clone()).or_insert_with(|| {
            order.push(reference.identity.clone());
            Pending {
                signals: Signals {
                    upstream_static: config.is_static,
                    ..Default::default()
                },
                config: config.clone(),
                partials: Vec::new(),
                attributes: reference.attributes.clone(),
                attributes_from_main: false,
            }
        });

        entry.signals.flags = entry.signals.flags.merge(reference.flags());
        entry.signals.in_head |= reference.in_head;
        if !entry.partials.contains(&reference.partial) {
            entry.partials.push(reference.partial.clone());
        }
        if !entry.attributes_from_main && reference.partial == DEFAULT_PARTIAL {
            entry.attributes = reference.attributes;
            entry.attributes_from_main = true;
        }
    }

    let mut fragments = Vec::with_capacity(order.len());
    let mut primary: Option<FragmentIdentity> = None;
    for identity in order {
        let Some(entry) = pending.remove(&identity) else {
            continue;
        };
        let classification = classify(&entry.signals);
        if classification == Classification::Primary {
            if let Some(first) = &primary {
                return Err(DiscoverError::MultiplePrimary {
                    first: first.clone(),
                    second: identity,
                });
            }
            primary = Some(identity.clone());
        }

        let requested = cookies.get(&version_cookie(&identity.name)).map(String::as_str);
        let version = entry.config.resolve_version(requested).to_string();
        fragments.push(DiscoveredFragment {
            identity,
            classification,
            version,
            partials: entry.partials,
            attributes: entry.attributes,
            config: entry.config,
        });
    }

    Ok(Discovery { fragments, missing })
}
