//! Page-class lifecycle hooks.

use serde_json::{Map, Value};

use super::RequestContext;
use crate::compose::ResponseHead;

/// Page logic. Every hook defaults to a no-op.
pub trait PageClass: Send + Sync {
    /// Once, when the page is created.
    fn on_create(&self) {}

    fn on_request(&self, _request: &RequestContext) {}

    /// Before each streamed chunk is written.
    fn on_chunk(&self, _chunk: &str) {}

    /// Before the response head is sent.
    fn on_response(&self, _head: &mut ResponseHead) {}

    fn on_response_end(&self) {}

    /// Value bound to `this` in expressions.
    fn bindings(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Page class that only provides fixed bindings.
#[derive(Debug, Clone, Default)]
pub struct StaticBindings(pub Value);

impl PageClass for StaticBindings {
    fn bindings(&self) -> Value {
        self.0.clone()
    }
}
