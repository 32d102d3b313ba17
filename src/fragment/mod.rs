//! Fragment references inside a page.
//!
//! A page embeds `<fragment from="Gateway" name="product" partial="main">`
//! elements. This module finds them, decides once per identity how each is
//! rendered and rewrites the elements into the containers the browser-side
//! runtime expects.
//!
//! # Module Structure
//!
//! - `classify` - precedence table turning signals into a [`Classification`]
//! - `discover` - walk the page, merge occurrences per identity
//! - `replace` - substitution points left in the compiled text
//! - `rewrite` - element to container rewriting

mod classify;
mod discover;
mod replace;
mod rewrite;

pub use classify::{AsyncFlags, Classification, PRECEDENCE, Signals, classify};
pub use discover::{DiscoverError, DiscoveredFragment, Discovery, discover};
pub use replace::{ReplaceItem, ReplaceKind, ReplaceSet, content_marker, placeholder_marker, slot_key};
pub use rewrite::{
    ATTR_ASYNC, ATTR_CHUNK, ATTR_CLASSIFICATION, ATTR_FRAGMENT, ATTR_GATEWAY, ATTR_PARTIAL,
    ATTR_PLACEHOLDER, StaticContent, condition_expression, escape_markers, rewrite,
};

use std::fmt;

use crate::dom::Element;
use crate::gateway::{AssetLocation, FragmentConfig};

pub const FRAGMENT_TAG: &str = "fragment";
pub const DEFAULT_PARTIAL: &str = "main";

/// Written wherever fragment content could not be resolved.
pub const CONTENT_NOT_FOUND: &str = "<script>console.log('Fragment Part does not exists')</script>";

/// Cookie selecting a fragment version.
pub fn version_cookie(fragment: &str) -> String {
    format!("puzzle_{fragment}_version")
}

/// Identity of a fragment: one fetch per identity and request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentIdentity {
    pub gateway: String,
    pub name: String,
}

impl FragmentIdentity {
    pub fn new(gateway: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FragmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gateway, self.name)
    }
}

/// One `<fragment>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentReference {
    pub identity: FragmentIdentity,
    pub partial: String,
    pub attributes: Vec<(String, String)>,
    pub in_head: bool,
}

impl FragmentReference {
    /// Read a reference from a `<fragment>` element.
    pub fn from_element(el: &Element, in_head: bool) -> Option<Self> {
        if el.tag != FRAGMENT_TAG {
            return None;
        }
        Some(Self {
            identity: FragmentIdentity::new(el.attr("from").unwrap_or_default(), el.attr("name").unwrap_or_default()),
            partial: el
                .attr("partial")
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_PARTIAL)
                .to_string(),
            attributes: el.attrs.iter().cloned().collect(),
            in_head,
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn flags(&self) -> FragmentFlags {
        let set = |name: &str| self.attr(name).is_some_and(|v| v != "false");
        FragmentFlags {
            primary: set("primary"),
            should_wait: set("should-wait") || set("shouldwait"),
            client_async: set("client-async"),
            client_async_force: set("client-async-force"),
            critical: set("critical"),
            on_demand: set("on-demand"),
            decentralized: set("decentralized"),
        }
    }
}

/// Rendering flags declared on references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragmentFlags {
    pub primary: bool,
    pub should_wait: bool,
    pub client_async: bool,
    pub client_async_force: bool,
    pub critical: bool,
    pub on_demand: bool,
    pub decentralized: bool,
}

impl FragmentFlags {
    /// Flags of several occurrences of one identity.
    pub fn merge(self, other: Self) -> Self {
        Self {
            primary: self.primary || other.primary,
            should_wait: self.should_wait || other.should_wait,
            client_async: self.client_async || other.client_async,
            client_async_force: self.client_async_force || other.client_async_force,
            critical: self.critical || other.critical,
            on_demand: self.on_demand || other.on_demand,
            decentralized: self.decentralized || other.decentralized,
        }
    }
}

/// Surround the main partial with the fragment's content-start/end assets.
pub fn wrap_content(config: &FragmentConfig, partial: &str, html: &str) -> String {
    if partial != DEFAULT_PARTIAL {
        return html.to_string();
    }
    let mut out = String::new();
    for asset in config.assets_at(AssetLocation::ContentStart) {
        out.push_str(&asset.markup());
    }
    out.push_str(html);
    for asset in config.assets_at(AssetLocation::ContentEnd) {
        out.push_str(&asset.markup());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::gateway::{AssetKind, FragmentAsset};

    fn first_reference(src: &str) -> FragmentReference {
        let doc = Document::parse(src);
        let mut found = None;
        doc.visit(&mut |el, in_head| {
            if found.is_none() {
                found = FragmentReference::from_element(el, in_head);
            }
        });
        found.unwrap()
    }

    #[test]
    fn test_reference_defaults() {
        let r = first_reference(r#"<fragment from="Browsing" name="product"/>"#);
        assert_eq!(r.identity, FragmentIdentity::new("Browsing", "product"));
        assert_eq!(r.partial, "main");
        assert!(!r.in_head);
        assert_eq!(r.flags(), FragmentFlags::default());
    }

    #[test]
    fn test_reference_flags() {
        let r = first_reference(
            r#"<fragment from="B" name="x" partial="gallery" shouldWait primary="false" client-async critical/>"#,
        );
        assert_eq!(r.partial, "gallery");
        let flags = r.flags();
        assert!(flags.should_wait && flags.client_async && flags.critical);
        assert!(!flags.primary);
    }

    #[test]
    fn test_flags_merge() {
        let a = FragmentFlags {
            primary: true,
            ..Default::default()
        };
        let b = FragmentFlags {
            should_wait: true,
            ..Default::default()
        };
        let merged = a.merge(b);
        assert!(merged.primary && merged.should_wait);
    }

    #[test]
    fn test_wrap_content_main_only() {
        let config = FragmentConfig {
            assets: vec![
                FragmentAsset {
                    kind: AssetKind::Js,
                    location: AssetLocation::ContentStart,
                    link: "/s.js".into(),
                },
                FragmentAsset {
                    kind: AssetKind::Js,
                    location: AssetLocation::ContentEnd,
                    link: "/e.js".into(),
                },
            ],
            ..Default::default()
        };
        let wrapped = wrap_content(&config, "main", "<b/>");
        assert!(wrapped.starts_with(r#"<script src="/s.js""#));
        assert!(wrapped.contains("<b/>"));
        assert!(wrapped.ends_with(r#"<script src="/e.js" type="text/javascript"></script>"#));
        assert_eq!(wrap_content(&config, "gallery", "<b/>"), "<b/>");
    }

    #[test]
    fn test_version_cookie() {
        assert_eq!(version_cookie("product"), "puzzle_product_version");
    }
}
