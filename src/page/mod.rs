//! Pages: one template, one page class, a cache of compiled handlers.
//!
//! Handlers depend on the effective fragment versions, so they are cached
//! per registry generation and version fingerprint. At most one compilation
//! runs per key; concurrent requests for the same key wait for it. Failed
//! compilations and compilations overtaken by a registry change are not
//! cached.

mod class;
mod request;

pub use class::{PageClass, StaticBindings};
pub use request::{RequestContext, parse_cookies};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::compose::{CompileOptions, CompiledHandler, ComposeError, ResponseHead, ResponseSink, Template};
use crate::fragment::{FragmentIdentity, version_cookie};
use crate::gateway::{GatewayMap, GatewayRegistry};
use crate::utils::hash::version_fingerprint;
use crate::{debug, log};

type HandlerCell = Arc<OnceCell<Arc<CompiledHandler>>>;

// =============================================================================
// Page
// =============================================================================

pub struct Page {
    name: String,
    template: Template,
    class: Arc<dyn PageClass>,
    registry: Arc<GatewayRegistry>,
    options: CompileOptions,
    /// Referenced identities; fixed for the template's lifetime.
    references: Vec<FragmentIdentity>,
    /// Version fingerprint to handler.
    handlers: DashMap<String, HandlerCell>,
    /// Registry generation the cached handlers were built against.
    generation: AtomicU64,
}

impl Page {
    /// Create a page. Fails when the template has no content.
    pub fn new(
        template: Template,
        class: Arc<dyn PageClass>,
        registry: Arc<GatewayRegistry>,
        options: CompileOptions,
    ) -> Result<Self, ComposeError> {
        let references = template.references()?;
        class.on_create();
        Ok(Self {
            name: template.name().to_string(),
            generation: AtomicU64::new(registry.generation()),
            template,
            class,
            registry,
            options,
            references,
            handlers: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Number of cached handlers.
    pub fn cached(&self) -> usize {
        self.handlers.len()
    }

    /// Answer one request. Returns the response status.
    pub async fn handle(&self, request: &RequestContext, sink: &mut dyn ResponseSink) -> u16 {
        match self.handler(&request.cookies).await {
            Ok(handler) => handler.handle(self.class.as_ref(), request, sink).await,
            Err(e) => {
                log!("error"; "{}: {}", self.name, e);
                sink.send_head(ResponseHead::error(500));
                sink.write("<h1>500 Internal Server Error</h1>");
                sink.end();
                500
            }
        }
    }

    /// Handler for a cookie combination, compiling it on first use.
    pub async fn handler(&self, cookies: &BTreeMap<String, String>) -> Result<Arc<CompiledHandler>, ComposeError> {
        self.sync_generation();
        // read before the snapshot: a racing update can only make the
        // snapshot newer than the key, never older
        let generation = self.registry.generation();
        let gateways = self.registry.snapshot();
        let key = format!("{generation}:{}", self.fingerprint(&gateways, cookies));

        // clone the cell out so no map guard is held across the await
        let cell = self.handlers.entry(key.clone()).or_default().clone();
        let handler = cell
            .get_or_try_init(|| async {
                debug!("page"; "{}: compiling for {}", self.name, key);
                self.template
                    .compile(&gateways, cookies, self.options)
                    .await
                    .map(Arc::new)
            })
            .await?;
        if self.registry.generation() != generation {
            self.handlers.remove(&key);
        }
        Ok(Arc::clone(handler))
    }

    /// Compile the default version combination ahead of traffic.
    pub async fn precompile(&self) -> Result<(), ComposeError> {
        self.handler(&BTreeMap::new()).await.map(|_| ())
    }

    /// Drop every cached handler.
    pub fn reload(&self) {
        self.handlers.clear();
        log!("page"; "{} reloaded", self.name);
    }

    fn sync_generation(&self) {
        let current = self.registry.generation();
        if self.generation.swap(current, Ordering::AcqRel) != current {
            self.handlers.clear();
            log!("page"; "{}: gateways changed, handlers dropped", self.name);
        }
    }

    /// Fingerprint of the versions `cookies` select for this page.
    fn fingerprint(&self, gateways: &GatewayMap, cookies: &BTreeMap<String, String>) -> String {
        let versions: Vec<(&str, &str, &str)> = self
            .references
            .iter()
            .filter_map(|identity| {
                let config = gateways.get(&identity.gateway)?.fragment(&identity.name)?;
                let requested = cookies.get(&version_cookie(&identity.name)).map(String::as_str);
                Some((
                    identity.gateway.as_str(),
                    identity.name.as_str(),
                    config.resolve_version(requested),
                ))
            })
            .collect();
        version_fingerprint(versions)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.name)
            .field("references", &self.references)
            .field("cached", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::{Value, json};

    use super::*;
    use crate::compose::BufferedSink;
    use crate::gateway::testing::ScriptedSource;
    use crate::gateway::{FragmentConfig, FragmentResponse, Gateway};

    const PAGE: &str = r#"<template><html><body>
        <fragment from="Browsing" name="product" shouldWait/>
        <fragment from="Browsing" name="footer"/>
    </body></html></template>"#;

    fn registry(source: &Arc<ScriptedSource>) -> Arc<GatewayRegistry> {
        Arc::new(GatewayRegistry::new([Gateway::new("Browsing", source.clone())
            .with_fragment(
                "product",
                FragmentConfig {
                    version: "1".into(),
                    versions: vec!["2".into()],
                    ..Default::default()
                },
            )
            .with_fragment(
                "footer",
                FragmentConfig {
                    is_static: true,
                    ..Default::default()
                },
            )]))
    }

    fn source() -> Arc<ScriptedSource> {
        Arc::new(
            ScriptedSource::new()
                .respond("product", FragmentResponse::ok([("main", "PRODUCT")]))
                .respond("footer", FragmentResponse::ok([("main", "FOOTER")])),
        )
    }

    fn page(source: &Arc<ScriptedSource>, class: Arc<dyn PageClass>) -> Page {
        Page::new(
            Template::new("product-detail", PAGE),
            class,
            registry(source),
            CompileOptions::default(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Counting {
        created: AtomicUsize,
        requests: AtomicUsize,
        ends: AtomicUsize,
    }

    impl PageClass for Counting {
        fn on_create(&self) {
            self.created.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request(&self, _request: &RequestContext) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }

        fn on_response(&self, head: &mut ResponseHead) {
            head.headers.push(("x-page".into(), "product-detail".into()));
        }

        fn on_response_end(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }

        fn bindings(&self) -> Value {
            json!({ "user": "ada" })
        }
    }

    #[tokio::test]
    async fn test_hooks_and_response() {
        let source = source();
        let class = Arc::new(Counting::default());
        let page = page(&source, class.clone());
        assert_eq!(class.created.load(Ordering::SeqCst), 1);

        let mut sink = BufferedSink::new();
        let status = page.handle(&RequestContext::get("/"), &mut sink).await;
        assert_eq!(status, 200);
        assert!(sink.body().contains("PRODUCT"));
        assert!(sink.body().contains("FOOTER"));
        assert_eq!(sink.head.unwrap().header("x-page"), Some("product-detail"));
        assert_eq!(class.requests.load(Ordering::SeqCst), 1);
        assert_eq!(class.ends.load(Ordering::SeqCst), 1);
        assert_eq!(class.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_compilation() {
        let source = source();
        let page = page(&source, Arc::new(StaticBindings::default()));

        let request = RequestContext::get("/");
        let (mut a, mut b) = (BufferedSink::new(), BufferedSink::new());
        futures::join!(page.handle(&request, &mut a), page.handle(&request, &mut b));

        // the static footer is fetched once per compilation
        assert_eq!(source.calls("footer"), 1);
        assert_eq!(source.calls("product"), 2);
        assert_eq!(page.cached(), 1);
        assert_eq!(a.body(), b.body());
    }

    #[tokio::test]
    async fn test_version_cookie_selects_handler() {
        let source = source();
        let page = page(&source, Arc::new(StaticBindings::default()));

        page.precompile().await.unwrap();
        assert_eq!(page.cached(), 1);

        // unknown version resolves to the default one
        let unknown = RequestContext::get("/").with_cookie("puzzle_product_version", "9");
        page.handle(&unknown, &mut BufferedSink::new()).await;
        assert_eq!(page.cached(), 1);

        let second = RequestContext::get("/").with_header("Cookie", "puzzle_product_version=2");
        page.handle(&second, &mut BufferedSink::new()).await;
        assert_eq!(page.cached(), 2);
        let versions: Vec<_> = source.requests().iter().map(|r| r.version.clone()).collect();
        assert!(versions.contains(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_registry_update_drops_handlers() {
        let source = source();
        let registry = registry(&source);
        let page = Page::new(
            Template::new("product-detail", PAGE),
            Arc::new(StaticBindings::default()),
            registry.clone(),
            CompileOptions::default(),
        )
        .unwrap();

        page.precompile().await.unwrap();
        assert_eq!(source.calls("footer"), 1);

        let mut fragments = registry.snapshot()["Browsing"].fragments.clone();
        if let Some(footer) = fragments.get_mut("footer") {
            footer.version = "2".into();
        }
        assert!(registry.update("Browsing", fragments));

        page.precompile().await.unwrap();
        assert_eq!(source.calls("footer"), 2);
        assert_eq!(page.cached(), 1);

        page.reload();
        assert_eq!(page.cached(), 0);
    }

    #[tokio::test]
    async fn test_update_without_version_change_recompiles() {
        let source = source();
        let registry = registry(&source);
        let page = Page::new(
            Template::new("product-detail", PAGE),
            Arc::new(StaticBindings::default()),
            registry.clone(),
            CompileOptions::default(),
        )
        .unwrap();

        let before = page.handler(&BTreeMap::new()).await.unwrap();
        let mut fragments = registry.snapshot()["Browsing"].fragments.clone();
        if let Some(footer) = fragments.get_mut("footer") {
            footer.is_static = false;
        }
        assert!(registry.update("Browsing", fragments));

        let after = page.handler(&BTreeMap::new()).await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.summary().iter().filter(|f| f.classification.name() == "static").count(), 0);
        assert_eq!(page.cached(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_compiled_across_update_not_kept() {
        let source = Arc::new(
            ScriptedSource::new()
                .respond("product", FragmentResponse::ok([("main", "PRODUCT")]))
                .respond("footer", FragmentResponse::ok([("main", "FOOTER")]))
                .delay("footer", 50),
        );
        let registry = registry(&source);
        let page = Page::new(
            Template::new("product-detail", PAGE),
            Arc::new(StaticBindings::default()),
            registry.clone(),
            CompileOptions::default(),
        )
        .unwrap();

        let update = async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let fragments = registry.snapshot()["Browsing"].fragments.clone();
            assert!(registry.update("Browsing", fragments));
        };
        let params = BTreeMap::new();
        let (compiled, ()) = futures::join!(page.handler(&params), update);
        assert!(compiled.is_ok());
        assert_eq!(page.cached(), 0);

        page.precompile().await.unwrap();
        assert_eq!(source.calls("footer"), 2);
        assert_eq!(page.cached(), 1);
    }

    #[tokio::test]
    async fn test_compile_failure_answers_500_and_is_retried() {
        let source = source();
        let page = Page::new(
            Template::new(
                "broken",
                r#"<div><fragment from="Browsing" name="product" primary/><fragment from="Browsing" name="footer" primary/></div>"#,
            ),
            Arc::new(StaticBindings::default()),
            registry(&source),
            CompileOptions::default(),
        )
        .unwrap();

        let mut sink = BufferedSink::new();
        assert_eq!(page.handle(&RequestContext::get("/"), &mut sink).await, 500);
        assert!(sink.ended);
        assert!(matches!(page.precompile().await, Err(ComposeError::MultiplePrimary(_))));
    }

    #[test]
    fn test_empty_template_rejected() {
        let source = source();
        let err = Page::new(
            Template::new("empty", ""),
            Arc::new(StaticBindings::default()),
            registry(&source),
            CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::MissingTemplate(_)));
    }
}
