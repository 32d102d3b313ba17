//! Substitution points left in the compiled page.

use super::{Classification, FragmentIdentity};
use crate::gateway::FragmentConfig;

/// Slot key of a `(name, partial)` pair, e.g. `product_main`.
pub fn slot_key(name: &str, partial: &str) -> String {
    format!("{name}_{partial}")
}

/// Text marker replaced by fragment content.
pub fn content_marker(key: &str) -> String {
    format!("{{fragment|{key}}}")
}

/// Text marker replaced by placeholder content.
pub fn placeholder_marker(key: &str) -> String {
    format!("{{placeholder|{key}}}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceKind {
    /// A `{fragment|..}` marker in the first flush.
    Content,
    /// A `puzzle-chunk` container filled after the first flush.
    ChunkedContent,
    /// A `{placeholder|..}` marker in the first flush.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceItem {
    pub kind: ReplaceKind,
    /// Marker text, or the chunk key for chunked content.
    pub key: String,
    pub partial: String,
}

impl ReplaceItem {
    pub fn new(kind: ReplaceKind, name: &str, partial: &str) -> Self {
        let slot = slot_key(name, partial);
        let key = match kind {
            ReplaceKind::Content => content_marker(&slot),
            ReplaceKind::ChunkedContent => slot,
            ReplaceKind::Placeholder => placeholder_marker(&slot),
        };
        Self {
            kind,
            key,
            partial: partial.to_string(),
        }
    }
}

/// All substitution points of one fragment identity.
#[derive(Debug, Clone)]
pub struct ReplaceSet {
    pub fragment: FragmentIdentity,
    pub classification: Classification,
    pub version: String,
    pub config: FragmentConfig,
    pub items: Vec<ReplaceItem>,
    /// Raw reference attributes, evaluated per request.
    pub attributes: Vec<(String, String)>,
}

impl ReplaceSet {
    pub fn is_primary(&self) -> bool {
        self.classification == Classification::Primary
    }

    pub fn items_of(&self, kind: ReplaceKind) -> impl Iterator<Item = &ReplaceItem> {
        self.items.iter().filter(move |i| i.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keys() {
        assert_eq!(ReplaceItem::new(ReplaceKind::Content, "product", "main").key, "{fragment|product_main}");
        assert_eq!(ReplaceItem::new(ReplaceKind::ChunkedContent, "product", "main").key, "product_main");
        assert_eq!(
            ReplaceItem::new(ReplaceKind::Placeholder, "product", "gallery").key,
            "{placeholder|product_gallery}"
        );
    }
}
