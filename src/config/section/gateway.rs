//! `[gateway.<Name>.fragments.<name>]` section configuration.
//!
//! Declares upstream fragments together with the canned answers served by
//! the local gateway.
//!
//! # Example
//!
//! ```toml
//! [gateway.Browsing.fragments.product]
//! version = "1"
//! versions = ["2"]                     # selectable via puzzle_product_version
//! placeholder = true
//! content = { main = "<div>Product</div>", gallery = "<ul></ul>" }
//! placeholder_html = "<div class='skeleton'></div>"
//! model = { price = 10 }
//! assets = [{ kind = "js", location = "content-start", link = "/product.js" }]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::gateway::{FragmentAsset, FragmentConfig, LocalFragment};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub fragments: BTreeMap<String, FragmentSection>,
}

/// Render configuration plus the local answer of one fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentSection {
    pub version: String,
    pub versions: Vec<String>,
    #[serde(rename = "static")]
    pub is_static: bool,
    pub placeholder: bool,
    pub redirect: bool,
    pub assets: Vec<FragmentAsset>,

    pub status: u16,
    /// Partial name to html.
    pub content: BTreeMap<String, String>,
    pub placeholder_html: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub model: Map<String, Value>,
}

impl Default for FragmentSection {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            versions: Vec::new(),
            is_static: false,
            placeholder: false,
            redirect: false,
            assets: Vec::new(),
            status: 200,
            content: BTreeMap::new(),
            placeholder_html: None,
            headers: BTreeMap::new(),
            model: Map::new(),
        }
    }
}

impl FragmentSection {
    pub fn config(&self) -> FragmentConfig {
        FragmentConfig {
            version: self.version.clone(),
            versions: self.versions.clone(),
            is_static: self.is_static,
            placeholder: self.placeholder,
            redirect: self.redirect,
            assets: self.assets.clone(),
        }
    }

    pub fn local(&self) -> LocalFragment {
        LocalFragment {
            status: self.status,
            content: self.content.clone(),
            placeholder: self.placeholder_html.clone(),
            headers: self.headers.clone(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::gateway::{AssetKind, AssetLocation};

    #[test]
    fn test_fragment_section() {
        let config = test_parse_config(
            r#"
[gateway.Browsing.fragments.product]
versions = ["2"]
static = true
content = { main = "<div>Product</div>" }
model = { price = 10 }
assets = [{ kind = "css", location = "head", link = "/p.css" }]
"#,
        );
        let section = &config.gateways["Browsing"].fragments["product"];
        let fragment = section.config();
        assert_eq!(fragment.version, "1");
        assert!(fragment.is_static);
        assert_eq!(fragment.assets[0].kind, AssetKind::Css);
        assert_eq!(fragment.assets[0].location, AssetLocation::Head);

        let local = section.local();
        assert_eq!(local.status, 200);
        assert_eq!(local.content["main"], "<div>Product</div>");
        assert_eq!(local.model["price"], 10);
    }
}
