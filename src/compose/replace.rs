//! The replace-waited step, shared by both strategies.

use std::future::Future;
use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::handler::CompiledHandler;
use crate::{debug, log};
use crate::fragment::{CONTENT_NOT_FOUND, ReplaceKind, ReplaceSet, wrap_content};
use crate::gateway::{FetchRequest, FragmentResponse, FragmentSource, Placeholder};
use crate::template::{ForwardedAttributes, condition_holds, process_expression};

/// Any waited-content or placeholder marker.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:fragment|placeholder)\|[^}]*\}").unwrap());

/// Waited content and placeholders of one request.
pub(super) struct Waited {
    /// Marker to text, applied to the first flush.
    replacements: FxHashMap<String, String>,
    /// Fetched waited fragments in completion order, with their set index.
    pub responses: Vec<(usize, FragmentResponse)>,
}

impl Waited {
    /// Substitute every known marker in one pass.
    ///
    /// Inserted content is never rescanned, so upstream text that happens
    /// to look like a marker survives. Unknown markers are left as they are.
    pub fn apply(&self, html: &str) -> String {
        MARKER
            .replace_all(html, |caps: &Captures| {
                let marker = &caps[0];
                self.replacements
                    .get(marker)
                    .cloned()
                    .unwrap_or_else(|| marker.to_string())
            })
            .into_owned()
    }

    /// Fetched responses by set index, declaration order.
    pub fn in_declaration_order(&self) -> Vec<&(usize, FragmentResponse)> {
        let mut ordered: Vec<_> = self.responses.iter().collect();
        ordered.sort_by_key(|(index, _)| *index);
        ordered
    }
}

/// Evaluate a set's attributes for this request.
pub(super) fn forwarded(set: &ReplaceSet, bindings: &Value, request: &Value) -> ForwardedAttributes {
    process_expression(
        set.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        bindings,
        Some(request),
    )
}

pub(super) fn fetch_request(set: &ReplaceSet, attributes: ForwardedAttributes, request: &Value) -> FetchRequest {
    FetchRequest {
        gateway: set.fragment.gateway.clone(),
        fragment: set.fragment.name.clone(),
        version: set.version.clone(),
        attributes,
        request: request.clone(),
    }
}

async fn fetch_content(
    source: Option<Arc<dyn FragmentSource>>,
    request: FetchRequest,
) -> FragmentResponse {
    match source {
        Some(source) => source.content(request).await,
        None => FragmentResponse::failure(),
    }
}

/// Run `fetch` on its own task so a panicking source only costs its own
/// fragment. The task starts before the returned future is polled.
fn spawn_or<T, F>(what: String, fetch: F, fallback: fn() -> T) -> impl Future<Output = T> + Send + 'static
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(fetch);
    async move {
        task.await.unwrap_or_else(|e| {
            log!("error"; "{} failed: {}", what, e);
            fallback()
        })
    }
}

/// Content fetch on its own task; a panic yields [`FragmentResponse::failure`].
pub(super) fn spawn_content(
    source: Option<Arc<dyn FragmentSource>>,
    request: FetchRequest,
) -> impl Future<Output = FragmentResponse> + Send + 'static {
    let what = format!("fetch of {}/{}", request.gateway, request.fragment);
    spawn_or(what, fetch_content(source, request), FragmentResponse::failure)
}

fn spawn_placeholder(
    source: Option<Arc<dyn FragmentSource>>,
    request: FetchRequest,
) -> impl Future<Output = Placeholder> + Send + 'static {
    let what = format!("placeholder of {}/{}", request.gateway, request.fragment);
    spawn_or(what, fetch_placeholder(source, request), Placeholder::default)
}

async fn fetch_placeholder(source: Option<Arc<dyn FragmentSource>>, request: FetchRequest) -> Placeholder {
    match source {
        Some(source) => source.placeholder(request).await,
        None => Placeholder::default(),
    }
}

/// Content for one partial, or the not-found marker.
pub(super) fn partial_content(set: &ReplaceSet, response: &FragmentResponse, partial: &str) -> String {
    match response.partial(partial) {
        Some(html) => wrap_content(&set.config, partial, html),
        None => {
            debug!("compose"; "{} has no `{}` partial (status {})", set.fragment, partial, response.status);
            CONTENT_NOT_FOUND.to_string()
        }
    }
}

/// Fetch every waited fragment and every declared placeholder.
///
/// All fetches are spawned before any is awaited. A falsy `if` skips
/// the fetch and empties the substitution points. Responses are kept in
/// the order they resolve.
pub(super) async fn replace_waited(handler: &CompiledHandler, bindings: &Value, request: &Value) -> Waited {
    let mut replacements = FxHashMap::default();

    let mut contents = FuturesUnordered::new();
    for (index, set) in handler.waited.iter().enumerate() {
        let attributes = forwarded(set, bindings, request);
        if !condition_holds(&attributes) {
            debug!("compose"; "{} skipped by condition", set.fragment);
            for item in set.items_of(ReplaceKind::Content) {
                replacements.insert(item.key.clone(), String::new());
            }
            continue;
        }
        let fetch = spawn_content(handler.source(set), fetch_request(set, attributes, request));
        contents.push(async move { (index, fetch.await) });
    }

    let mut placeholders = Vec::new();
    for (index, set) in handler.placeholders.iter().enumerate() {
        let attributes = forwarded(set, bindings, request);
        if !condition_holds(&attributes) {
            for item in set.items_of(ReplaceKind::Placeholder) {
                replacements.insert(item.key.clone(), String::new());
            }
            continue;
        }
        let fetch = spawn_placeholder(handler.source(set), fetch_request(set, attributes, request));
        placeholders.push(async move { (index, fetch.await) });
    }

    let (responses, placeholders) = futures::join!(contents.collect::<Vec<_>>(), join_all(placeholders));

    for (index, response) in &responses {
        let set = &handler.waited[*index];
        for item in set.items_of(ReplaceKind::Content) {
            replacements.insert(item.key.clone(), partial_content(set, response, &item.partial));
        }
    }
    for (index, placeholder) in &placeholders {
        let set = &handler.placeholders[*index];
        for item in set.items_of(ReplaceKind::Placeholder) {
            replacements.insert(item.key.clone(), placeholder.for_partial(&item.partial).to_string());
        }
    }

    Waited {
        replacements,
        responses,
    }
}
