//! Hot-swappable gateway table.
//!
//! Uses `arc-swap` for lock-free reads: every page compilation works on one
//! consistent snapshot while configuration updates replace the table
//! atomically. Pages watch [`GatewayRegistry::generation`] to drop cached
//! handlers after an update.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use super::{FragmentConfig, FragmentSource};
use crate::log;

/// One upstream service.
pub struct Gateway {
    pub name: String,
    pub fragments: BTreeMap<String, FragmentConfig>,
    pub source: Arc<dyn FragmentSource>,
}

impl Gateway {
    pub fn new(name: impl Into<String>, source: Arc<dyn FragmentSource>) -> Self {
        Self {
            name: name.into(),
            fragments: BTreeMap::new(),
            source,
        }
    }

    pub fn with_fragment(mut self, name: impl Into<String>, config: FragmentConfig) -> Self {
        self.fragments.insert(name.into(), config);
        self
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentConfig> {
        self.fragments.get(name)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("name", &self.name)
            .field("fragments", &self.fragments)
            .finish_non_exhaustive()
    }
}

pub type GatewayMap = FxHashMap<String, Arc<Gateway>>;

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: ArcSwap<GatewayMap>,
    generation: AtomicU64,
}

impl GatewayRegistry {
    pub fn new(gateways: impl IntoIterator<Item = Gateway>) -> Self {
        let map = gateways
            .into_iter()
            .map(|g| (g.name.clone(), Arc::new(g)))
            .collect();
        Self {
            gateways: ArcSwap::from_pointee(map),
            generation: AtomicU64::new(0),
        }
    }

    /// Current table; stays valid even if an update lands meanwhile.
    #[inline]
    pub fn snapshot(&self) -> Arc<GatewayMap> {
        self.gateways.load_full()
    }

    /// Bumped on every change.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Add or replace a whole gateway.
    pub fn insert(&self, gateway: Gateway) {
        let gateway = Arc::new(gateway);
        self.gateways.rcu(|current| {
            let mut next = GatewayMap::clone(current);
            next.insert(gateway.name.clone(), Arc::clone(&gateway));
            next
        });
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Replace the fragment configuration of a known gateway.
    ///
    /// Returns `false` if the gateway is unknown.
    pub fn update(&self, gateway: &str, fragments: BTreeMap<String, FragmentConfig>) -> bool {
        let Some(current) = self.snapshot().get(gateway).cloned() else {
            log!("gateway"; "update for unknown gateway `{}` ignored", gateway);
            return false;
        };
        self.insert(Gateway {
            name: current.name.clone(),
            fragments,
            source: Arc::clone(&current.source),
        });
        log!("gateway"; "{} configuration updated", gateway);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedSource;

    fn registry() -> GatewayRegistry {
        let source = Arc::new(ScriptedSource::new());
        GatewayRegistry::new([
            Gateway::new("Browsing", source).with_fragment("product", FragmentConfig::default())
        ])
    }

    #[test]
    fn test_update_swaps_and_bumps_generation() {
        let registry = registry();
        let before = registry.snapshot();
        assert_eq!(registry.generation(), 0);

        let mut fragments = BTreeMap::new();
        fragments.insert(
            "product".to_string(),
            FragmentConfig {
                is_static: true,
                ..Default::default()
            },
        );
        assert!(registry.update("Browsing", fragments));
        assert_eq!(registry.generation(), 1);

        // old snapshot is untouched
        assert!(!before["Browsing"].fragments["product"].is_static);
        assert!(registry.snapshot()["Browsing"].fragments["product"].is_static);
    }

    #[test]
    fn test_update_unknown_gateway() {
        let registry = registry();
        assert!(!registry.update("Nope", BTreeMap::new()));
        assert_eq!(registry.generation(), 0);
    }
}
