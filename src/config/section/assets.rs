//! `[assets]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [assets]
//! library_script = "/static/puzzle.min.js"
//! stylesheets = ["/static/bundle.css"]
//! ```

use serde::{Deserialize, Serialize};

use crate::compose::PageAssets;

pub const DEFAULT_LIBRARY_SCRIPT: &str = "/static/puzzle.min.js";

/// Assets injected into the `<head>` of every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Browser runtime bootstrap script. Empty disables it.
    pub library_script: String,
    pub stylesheets: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            library_script: DEFAULT_LIBRARY_SCRIPT.to_string(),
            stylesheets: Vec::new(),
        }
    }
}

impl AssetsConfig {
    pub fn page_assets(&self) -> PageAssets {
        PageAssets {
            library_script: (!self.library_script.is_empty()).then(|| self.library_script.clone()),
            stylesheets: self.stylesheets.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_assets_defaults() {
        let config = test_parse_config("");
        let assets = config.assets.page_assets();
        assert_eq!(assets.library_script.as_deref(), Some("/static/puzzle.min.js"));
        assert!(assets.stylesheets.is_empty());
    }

    #[test]
    fn test_library_script_disabled() {
        let config = test_parse_config("[assets]\nlibrary_script = \"\"\nstylesheets = [\"/a.css\"]");
        let assets = config.assets.page_assets();
        assert_eq!(assets.library_script, None);
        assert_eq!(assets.stylesheets, vec!["/a.css"]);
    }
}
