//! Compiled page handlers.
//!
//! A [`CompiledHandler`] is immutable; everything that belongs to one
//! request (rendered text, responses, collected scripts) lives in locals of
//! [`CompiledHandler::handle`].

use std::sync::Arc;
use std::time::SystemTime;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use super::markup;
use super::merge::ResponseState;
use super::replace::{Waited, fetch_request, forwarded, partial_content, replace_waited, spawn_content};
use super::sink::ResponseSink;
use crate::fragment::{Classification, FragmentIdentity, ReplaceKind, ReplaceSet};
use crate::gateway::FragmentSource;
use crate::page::{PageClass, RequestContext};
use crate::template::{CompiledTemplate, condition_holds};
use crate::debug;

/// How responses are delivered; fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Whole body in one write.
    Buffered,
    /// First flush, then one write per chunked fragment.
    Streaming,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Streaming => "streaming",
        }
    }
}

/// Row of the classification table.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSummary {
    pub identity: FragmentIdentity,
    pub classification: Classification,
    pub version: String,
    pub partials: Vec<String>,
}

pub struct CompiledHandler {
    pub(super) name: String,
    pub(super) first_flush: CompiledTemplate,
    pub(super) waited: Vec<ReplaceSet>,
    pub(super) chunked: Vec<ReplaceSet>,
    pub(super) placeholders: Vec<ReplaceSet>,
    /// Asset markup written right before `</body>`.
    pub(super) body_end: String,
    pub(super) sources: FxHashMap<String, Arc<dyn FragmentSource>>,
    pub(super) strategy: Strategy,
    pub(super) summary: Vec<FragmentSummary>,
}

impl std::fmt::Debug for CompiledHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledHandler")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl CompiledHandler {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn waited(&self) -> &[ReplaceSet] {
        &self.waited
    }

    pub fn chunked(&self) -> &[ReplaceSet] {
        &self.chunked
    }

    pub fn placeholders(&self) -> &[ReplaceSet] {
        &self.placeholders
    }

    /// Fragments in declaration order with their classification.
    pub fn summary(&self) -> &[FragmentSummary] {
        &self.summary
    }

    /// The first flush as rendered for `context`, markers unresolved.
    pub fn render_first_flush(&self, context: &Value) -> String {
        self.first_flush.render(context)
    }

    pub(super) fn source(&self, set: &ReplaceSet) -> Option<Arc<dyn FragmentSource>> {
        self.sources.get(&set.fragment.gateway).cloned()
    }

    /// Serve one request. Returns the response status.
    pub async fn handle(
        &self,
        class: &dyn PageClass,
        request: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> u16 {
        class.on_request(request);
        let bindings = class.bindings();
        let req = request.to_value();
        let html = self.first_flush.render(&json!({ "this": &bindings, "req": &req }));

        match self.strategy {
            Strategy::Buffered => self.buffered(class, &html, &bindings, &req, sink).await,
            Strategy::Streaming => self.streaming(class, &html, &bindings, &req, sink).await,
        }
    }

    async fn buffered(
        &self,
        class: &dyn PageClass,
        html: &str,
        bindings: &Value,
        req: &Value,
        sink: &mut dyn ResponseSink,
    ) -> u16 {
        let waited = replace_waited(self, bindings, req).await;
        let mut html = waited.apply(html);
        let (state, models) = self.merge(&waited);
        let status = state.status;

        if state.is_permanent_redirect() {
            sink.send_head(state.into_head(false));
            sink.end();
            class.on_response_end();
            return status;
        }

        let mut extra = self.body_end.clone();
        extra.push_str(&models);
        markup::insert_before_body_end(&mut html, &extra);

        let mut head = state.into_head(false);
        class.on_response(&mut head);
        sink.send_head(head);
        sink.write(&html);
        sink.end();
        class.on_response_end();
        status
    }

    async fn streaming(
        &self,
        class: &dyn PageClass,
        html: &str,
        bindings: &Value,
        req: &Value,
        sink: &mut dyn ResponseSink,
    ) -> u16 {
        let (body, tail) = markup::split_document_end(html);

        // Chunked fetches start before the waited step is awaited.
        let mut pending = FuturesUnordered::new();
        for (index, set) in self.chunked.iter().enumerate() {
            let attributes = forwarded(set, bindings, req);
            if !condition_holds(&attributes) {
                debug!("compose"; "{} skipped by condition", set.fragment);
                continue;
            }
            let fetch = spawn_content(self.source(set), fetch_request(set, attributes, req));
            pending.push(async move { (index, fetch.await) });
        }

        let waited = replace_waited(self, bindings, req).await;
        let body = waited.apply(body);
        let (state, mut models) = self.merge(&waited);
        let status = state.status;

        if state.is_permanent_redirect() {
            sink.send_head(state.into_head(false));
            sink.end();
            class.on_response_end();
            return status;
        }

        let mut head = state.into_head(true);
        class.on_response(&mut head);
        sink.send_head(head);
        sink.write(&body);
        sink.flush();

        while let Some((index, response)) = pending.next().await {
            let set = &self.chunked[index];

            let mut chunk = String::new();
            for item in set.items_of(ReplaceKind::ChunkedContent) {
                let content = partial_content(set, &response, &item.partial);
                chunk.push_str(&markup::chunk(&set.fragment.name, &item.key, &content));
            }
            if let Some(script) = markup::model_script(&set.fragment.name, &response.model) {
                models.push_str(&script);
            }

            class.on_chunk(&chunk);
            sink.write(&chunk);
            sink.flush();
        }

        let mut closing = self.body_end.clone();
        closing.push_str(&models);
        closing.push_str(markup::page_load_script());
        closing.push_str(tail);
        sink.write(&closing);
        sink.end();
        class.on_response_end();
        status
    }

    /// Fold waited responses into the page response, declaration order.
    /// Also returns their model scripts, resolution order.
    fn merge(&self, waited: &Waited) -> (ResponseState, String) {
        let mut state = ResponseState::new(SystemTime::now());
        for (index, response) in waited.in_declaration_order() {
            state.apply(&self.waited[*index], response);
        }
        let mut models = String::new();
        for (index, response) in &waited.responses {
            let set = &self.waited[*index];
            if let Some(script) = markup::model_script(&set.fragment.name, &response.model) {
                models.push_str(&script);
            }
        }
        (state, models)
    }
}
