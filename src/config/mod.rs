//! Server configuration management for `puzzle.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── assets     # [assets]
//! │   ├── gateway    # [gateway.<Name>.fragments.<name>]
//! │   ├── page       # [[page]]
//! │   └── serve      # [serve]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # PuzzleConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section                             | Purpose                               |
//! |-------------------------------------|---------------------------------------|
//! | `[serve]`                           | HTTP server (interface, port, workers)|
//! | `[assets]`                          | Library script and stylesheets        |
//! | `[[page]]`                          | Page name, url, template, bindings    |
//! | `[gateway.<Name>.fragments.<name>]` | Fragment configuration and content    |

pub mod section;
pub mod types;
mod util;

pub use util::find_config_file;

pub use section::{AssetsConfig, FragmentSection, GatewaySection, PageSection, ServeConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};

use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::compose::Template;
use crate::gateway::{Gateway, GatewayRegistry, LocalSource};
use crate::log;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing puzzle.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PuzzleConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory templates are resolved against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    pub serve: ServeConfig,

    pub assets: AssetsConfig,

    #[serde(rename = "page")]
    pub pages: Vec<PageSection>,

    #[serde(rename = "gateway")]
    pub gateways: BTreeMap<String, GatewaySection>,
}

impl PuzzleConfig {
    /// Load and validate a config file.
    ///
    /// Unknown fields are reported as warnings; validation problems are
    /// collected and returned together.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        let mut diag = ConfigDiagnostics::new();
        for field in fields {
            diag.warn(field.as_str());
        }
        log!("warning"; "in {}:", display_path);
        diag.print_warnings();
    }

    /// Join a path with the config directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Apply `puzzle serve` overrides.
    pub fn apply_serve_options(&mut self, interface: Option<IpAddr>, port: Option<u16>) {
        Self::update_option(&mut self.serve.interface, interface.as_ref());
        Self::update_option(&mut self.serve.port, port.as_ref());
    }

    fn update_option<T: Clone>(target: &mut T, value: Option<&T>) {
        if let Some(v) = value {
            *target = v.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Check everything that can be checked without compiling pages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if self.serve.workers == 0 {
            diag.error(FieldPath::new("serve.workers"), "must be at least 1");
        }

        let mut names = FxHashSet::default();
        let mut urls = FxHashSet::default();
        for (i, page) in self.pages.iter().enumerate() {
            if page.name.is_empty() {
                diag.error(FieldPath::entry("page", i, "name"), "page name is empty");
            } else if !names.insert(page.name.as_str()) {
                diag.error(
                    FieldPath::entry("page", i, "name"),
                    format!("duplicate page name `{}`", page.name),
                );
            }

            if !page.url.starts_with('/') {
                diag.error_with_hint(
                    FieldPath::entry("page", i, "url"),
                    format!("invalid url `{}`", page.url),
                    "urls are absolute request paths, e.g. `/product`",
                );
            } else if !urls.insert(page.url.as_str()) {
                diag.error(
                    FieldPath::entry("page", i, "url"),
                    format!("duplicate url `{}`", page.url),
                );
            }

            if page.template.as_os_str().is_empty() {
                diag.error(FieldPath::entry("page", i, "template"), "page has no template");
            } else if !self.root_join(&page.template).is_file() {
                diag.error_with_hint(
                    FieldPath::entry("page", i, "template"),
                    format!("template `{}` not found", page.template.display()),
                    "paths are relative to the config file",
                );
            }
        }

        for (gateway, section) in &self.gateways {
            for (name, fragment) in &section.fragments {
                for (i, asset) in fragment.assets.iter().enumerate() {
                    if asset.link.is_empty() {
                        diag.error(
                            FieldPath::new(format!("gateway.{gateway}.fragments.{name}.assets[{i}].link")),
                            "asset link is empty",
                        );
                    }
                }
            }
        }

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    // ========================================================================
    // accessors
    // ========================================================================

    pub fn page(&self, name: &str) -> Option<&PageSection> {
        self.pages.iter().find(|p| p.name == name)
    }

    /// Page answering a request path.
    pub fn page_for_url(&self, path: &str) -> Option<&PageSection> {
        self.pages.iter().find(|p| p.url == path)
    }

    /// Read a page's template.
    pub fn template(&self, page: &PageSection) -> Result<Template, ConfigError> {
        let path = self.root_join(&page.template);
        let source = fs::read_to_string(&path).map_err(|err| ConfigError::Io(path, err))?;
        Ok(Template::new(page.name.clone(), source).with_assets(self.assets.page_assets()))
    }

    /// Gateways backed by the configured local content.
    pub fn registry(&self) -> GatewayRegistry {
        GatewayRegistry::new(self.gateways.iter().map(|(name, section)| {
            let source = LocalSource::new(
                section
                    .fragments
                    .iter()
                    .map(|(fragment, f)| (fragment.clone(), f.local())),
            );
            let mut gateway = Gateway::new(name.clone(), Arc::new(source));
            for (fragment, f) in &section.fragments {
                gateway = gateway.with_fragment(fragment.clone(), f.config());
            }
            gateway
        }))
    }
}

/// Parse config for tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PuzzleConfig {
    PuzzleConfig::from_str(content).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FetchRequest;
    use crate::template::ForwardedAttributes;

    const CONFIG: &str = r#"
[serve]
port = 8080

[[page]]
name = "product-detail"
url = "/product"
template = "product.html"

[gateway.Browsing.fragments.product]
content = { main = "<div>Product</div>" }
"#;

    fn write_site(config: &str, templates: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        for name in templates {
            fs::write(dir.path().join(name), "<div></div>").unwrap();
        }
        let path = dir.path().join("puzzle.toml");
        fs::write(&path, config).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load() {
        let (dir, path) = write_site(CONFIG, &["product.html"]);
        let config = PuzzleConfig::load(&path).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.page_for_url("/product").unwrap().name, "product-detail");
        assert!(config.page("nope").is_none());

        let template = config.template(&config.pages[0]).unwrap();
        assert_eq!(template.name(), "product-detail");
    }

    #[test]
    fn test_unknown_fields_are_not_fatal() {
        let (_dir, path) = write_site(&format!("{CONFIG}\n[serve.extra]\nx = 1\n"), &["product.html"]);
        assert!(PuzzleConfig::load(&path).is_ok());

        let (_, ignored) = PuzzleConfig::parse_with_ignored("[serve]\nportt = 1").unwrap();
        assert_eq!(ignored, vec!["serve.portt"]);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let config = r#"
[[page]]
name = "a"
url = "/"
template = "a.html"

[[page]]
name = "a"
url = "/"
template = "missing.html"

[[page]]
name = "c"
url = "relative"
"#;
        let (_dir, path) = write_site(config, &["a.html"]);
        let Err(ConfigError::Diagnostics(diag)) = PuzzleConfig::load(&path) else {
            panic!("expected diagnostics");
        };
        let fields: Vec<_> = diag.errors().iter().map(|e| e.field.as_str().to_string()).collect();
        assert_eq!(
            fields,
            vec!["page[1].name", "page[1].url", "page[1].template", "page[2].url", "page[2].template"]
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            PuzzleConfig::from_str("[serve\nport = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PuzzleConfig::load(&dir.path().join("puzzle.toml")),
            Err(ConfigError::Io(..))
        ));
    }

    #[test]
    fn test_serve_overrides() {
        let mut config = test_parse_config(CONFIG);
        config.apply_serve_options(Some("0.0.0.0".parse().unwrap()), None);
        assert_eq!(config.serve.interface.to_string(), "0.0.0.0");
        assert_eq!(config.serve.port, 8080);
    }

    #[tokio::test]
    async fn test_registry_serves_local_content() {
        let config = test_parse_config(CONFIG);
        let registry = config.registry();
        let gateways = registry.snapshot();
        let browsing = &gateways["Browsing"];
        assert_eq!(browsing.fragment("product").unwrap().version, "1");

        let response = browsing
            .source
            .content(FetchRequest {
                gateway: "Browsing".into(),
                fragment: "product".into(),
                version: "1".into(),
                attributes: ForwardedAttributes::default(),
                request: serde_json::Value::Null,
            })
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.partial("main"), Some("<div>Product</div>"));
    }
}
