//! Configuration-backed fragment source.
//!
//! Serves canned fragment answers straight from `puzzle.toml`, which is
//! enough to run and inspect pages without real upstream services.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::{FetchRequest, FragmentResponse, FragmentSource, Placeholder};
use crate::debug;

/// Canned answer for one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFragment {
    pub status: u16,
    pub content: BTreeMap<String, String>,
    pub placeholder: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub model: Map<String, Value>,
}

impl Default for LocalFragment {
    fn default() -> Self {
        Self {
            status: 200,
            content: BTreeMap::new(),
            placeholder: None,
            headers: BTreeMap::new(),
            model: Map::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LocalSource {
    fragments: FxHashMap<String, LocalFragment>,
}

impl LocalSource {
    pub fn new(fragments: impl IntoIterator<Item = (String, LocalFragment)>) -> Self {
        Self {
            fragments: fragments.into_iter().collect(),
        }
    }
}

#[async_trait]
impl FragmentSource for LocalSource {
    async fn content(&self, request: FetchRequest) -> FragmentResponse {
        let Some(fragment) = self.fragments.get(&request.fragment) else {
            debug!("gateway"; "{}/{} has no local content", request.gateway, request.fragment);
            return FragmentResponse::failure();
        };
        FragmentResponse {
            status: fragment.status,
            headers: fragment
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            cookies: Vec::new(),
            html: fragment.content.clone(),
            model: fragment.model.clone(),
        }
    }

    async fn placeholder(&self, request: FetchRequest) -> Placeholder {
        self.fragments
            .get(&request.fragment)
            .and_then(|f| f.placeholder.clone())
            .map(Placeholder::Single)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ForwardedAttributes;

    fn request(fragment: &str) -> FetchRequest {
        FetchRequest {
            gateway: "Local".into(),
            fragment: fragment.into(),
            version: "1".into(),
            attributes: ForwardedAttributes::default(),
            request: Value::Null,
        }
    }

    fn source() -> LocalSource {
        LocalSource::new([(
            "header".to_string(),
            LocalFragment {
                status: 404,
                content: BTreeMap::from([("main".to_string(), "<nav/>".to_string())]),
                placeholder: Some("<i>loading</i>".into()),
                headers: BTreeMap::from([("X-Trace".to_string(), "1".to_string())]),
                ..Default::default()
            },
        )])
    }

    #[tokio::test]
    async fn test_known_fragment() {
        let response = source().content(request("header")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.partial("main"), Some("<nav/>"));
        assert_eq!(response.header("x-trace"), Some("1"));
    }

    #[tokio::test]
    async fn test_unknown_fragment_is_failure() {
        let response = source().content(request("footer")).await;
        assert_eq!(response, FragmentResponse::failure());
        assert_eq!(source().placeholder(request("footer")).await, Placeholder::default());
    }

    #[tokio::test]
    async fn test_placeholder() {
        let placeholder = source().placeholder(request("header")).await;
        assert_eq!(placeholder.for_partial("main"), "<i>loading</i>");
    }
}
