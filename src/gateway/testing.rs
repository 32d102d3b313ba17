//! Scripted fragment source for tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{FetchRequest, FragmentResponse, FragmentSource, Placeholder};

#[derive(Debug, Clone)]
struct Script {
    response: FragmentResponse,
    placeholder: Placeholder,
    delay: Duration,
    panics: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            response: FragmentResponse::failure(),
            placeholder: Placeholder::default(),
            delay: Duration::ZERO,
            panics: false,
        }
    }
}

/// Answers from a script, with optional delays, and records every call.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: FxHashMap<String, Script>,
    requests: Mutex<Vec<FetchRequest>>,
    placeholder_requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&mut self, fragment: &str) -> &mut Script {
        self.scripts.entry(fragment.to_string()).or_default()
    }

    pub fn respond(mut self, fragment: &str, response: FragmentResponse) -> Self {
        self.script(fragment).response = response;
        self
    }

    pub fn delay(mut self, fragment: &str, millis: u64) -> Self {
        self.script(fragment).delay = Duration::from_millis(millis);
        self
    }

    pub fn placeholder(mut self, fragment: &str, placeholder: Placeholder) -> Self {
        self.script(fragment).placeholder = placeholder;
        self
    }

    /// Make content fetches for `fragment` panic.
    pub fn panics(mut self, fragment: &str) -> Self {
        self.script(fragment).panics = true;
        self
    }

    /// Number of content fetches for `fragment`.
    pub fn calls(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.fragment == fragment)
            .count()
    }

    pub fn placeholder_calls(&self, fragment: &str) -> usize {
        self.placeholder_requests
            .lock()
            .iter()
            .filter(|f| *f == fragment)
            .count()
    }

    /// Recorded content fetches, in call order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl FragmentSource for ScriptedSource {
    async fn content(&self, request: FetchRequest) -> FragmentResponse {
        let script = self.scripts.get(&request.fragment).cloned().unwrap_or_default();
        self.requests.lock().push(request);
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        if script.panics {
            panic!("scripted failure");
        }
        script.response
    }

    async fn placeholder(&self, request: FetchRequest) -> Placeholder {
        self.placeholder_requests.lock().push(request.fragment.clone());
        self.scripts
            .get(&request.fragment)
            .map(|s| s.placeholder.clone())
            .unwrap_or_default()
    }
}
