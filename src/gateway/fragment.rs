//! Upstream fragment render configuration.

use serde::{Deserialize, Serialize};

use crate::utils::html::escape_attr;

/// How a gateway says a fragment should be rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Default version served when no cookie selects another one.
    pub version: String,
    /// Other versions a cookie may select.
    pub versions: Vec<String>,
    /// Content never varies per request; inlined at compile time.
    #[serde(rename = "static")]
    pub is_static: bool,
    /// Fragment serves placeholder markup.
    pub placeholder: bool,
    /// Non-primary fragment may redirect the page.
    pub redirect: bool,
    pub assets: Vec<FragmentAsset>,
}

impl FragmentConfig {
    /// The version to use when `requested` came from a cookie.
    ///
    /// Unknown versions fall back to the default one.
    pub fn resolve_version<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(v) if v == self.version || self.versions.iter().any(|known| known == v) => v,
            _ => &self.version,
        }
    }

    pub fn assets_at(&self, location: AssetLocation) -> impl Iterator<Item = &FragmentAsset> {
        self.assets.iter().filter(move |a| a.location == location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Js,
    Css,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetLocation {
    Head,
    ContentStart,
    ContentEnd,
    BodyEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentAsset {
    pub kind: AssetKind,
    pub location: AssetLocation,
    pub link: String,
}

impl FragmentAsset {
    /// Markup that loads the asset.
    pub fn markup(&self) -> String {
        let link = escape_attr(&self.link);
        match self.kind {
            AssetKind::Js => format!(r#"<script src="{link}" type="text/javascript"></script>"#),
            AssetKind::Css => format!(r#"<link rel="stylesheet" href="{link}">"#),
        }
    }
}
