//! `[[page]]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [[page]]
//! name = "product-detail"
//! url = "/product"
//! template = "pages/product.html"   # relative to puzzle.toml
//! debug = false                     # tag containers with their classification
//! precompile = true                 # compile at startup, fail on static errors
//!
//! [page.bindings]                   # bound to `this` in expressions
//! title = "Product"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compose::CompileOptions;

/// One routed page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSection {
    pub name: String,
    /// Request path the page answers.
    pub url: String,
    pub template: PathBuf,
    pub debug: bool,
    pub precompile: bool,
    pub bindings: Map<String, Value>,
}

impl PageSection {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            debug: self.debug,
            precompile: self.precompile,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_page_section() {
        let config = test_parse_config(
            "[[page]]\nname = \"home\"\nurl = \"/\"\ntemplate = \"home.html\"\ndebug = true\n\n[page.bindings]\ntitle = \"Home\"\ncount = 3",
        );
        let page = &config.pages[0];
        assert_eq!(page.name, "home");
        assert!(page.compile_options().debug);
        assert!(!page.compile_options().precompile);
        assert_eq!(page.bindings["title"], "Home");
        assert_eq!(page.bindings["count"], 3);
    }
}
