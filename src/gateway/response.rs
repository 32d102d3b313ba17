//! What a fragment source answers.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};

/// Result of a content fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentResponse {
    pub status: u16,
    /// Lowercase header names.
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<ResponseCookie>,
    /// Partial name to html.
    pub html: BTreeMap<String, String>,
    /// Client-side variables, emitted as `ON_VARIABLES` events.
    pub model: Map<String, Value>,
}

impl FragmentResponse {
    /// Best-effort answer for a failed fetch.
    pub fn failure() -> Self {
        Self {
            status: 500,
            headers: Vec::new(),
            cookies: Vec::new(),
            html: BTreeMap::new(),
            model: Map::new(),
        }
    }

    /// A 200 response with the given partials.
    pub fn ok<I, K, V>(html: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            status: 200,
            html: html.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::failure()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_cookie(mut self, cookie: ResponseCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_model(mut self, key: impl Into<String>, value: Value) -> Self {
        self.model.insert(key.into(), value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn partial(&self, name: &str) -> Option<&str> {
        self.html.get(name).map(String::as_str)
    }
}

// =============================================================================
// Cookies
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieExpiry {
    /// Relative lifetime as sent by the fragment.
    After(Duration),
    At(SystemTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<CookieExpiry>,
    pub path: Option<String>,
    pub http_only: bool,
    pub secure: bool,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: None,
            http_only: false,
            secure: false,
        }
    }

    pub fn expires_after(mut self, lifetime: Duration) -> Self {
        self.expires = Some(CookieExpiry::After(lifetime));
        self
    }

    /// Turn a relative expiry into an absolute one.
    pub fn normalized(mut self, now: SystemTime) -> Self {
        if let Some(CookieExpiry::After(lifetime)) = self.expires {
            self.expires = Some(CookieExpiry::At(now + lifetime));
        }
        self
    }

    /// `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        match self.expires {
            Some(CookieExpiry::At(at)) => {
                out.push_str("; Expires=");
                out.push_str(&httpdate::fmt_http_date(at));
            }
            Some(CookieExpiry::After(lifetime)) => {
                out.push_str(&format!("; Max-Age={}", lifetime.as_secs()));
            }
            None => {}
        }
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// Interim markup shown until fragment content arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    /// Same markup for every partial.
    Single(String),
    Partials(BTreeMap<String, String>),
}

impl Default for Placeholder {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl Placeholder {
    pub fn for_partial(&self, partial: &str) -> &str {
        match self {
            Self::Single(html) => html,
            Self::Partials(map) => map.get(partial).map_or("", String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_shape() {
        let r = FragmentResponse::failure();
        assert_eq!(r.status, 500);
        assert!(r.html.is_empty() && r.headers.is_empty() && r.model.is_empty());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let r = FragmentResponse::ok([("main", "x")]).with_header("Location", "/a");
        assert_eq!(r.header("location"), Some("/a"));
        assert_eq!(r.header("LOCATION"), Some("/a"));
    }

    #[test]
    fn test_cookie_normalization() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let cookie = ResponseCookie::new("sid", "1")
            .expires_after(Duration::from_secs(60))
            .normalized(now);
        assert_eq!(
            cookie.expires,
            Some(CookieExpiry::At(SystemTime::UNIX_EPOCH + Duration::from_secs(1_060)))
        );
        assert_eq!(
            cookie.to_header_value(),
            "sid=1; Expires=Thu, 01 Jan 1970 00:17:40 GMT"
        );
    }

    #[test]
    fn test_placeholder_lookup() {
        let single = Placeholder::Single("<i>..</i>".into());
        assert_eq!(single.for_partial("gallery"), "<i>..</i>");
        let map = Placeholder::Partials(BTreeMap::from([("main".to_string(), "m".to_string())]));
        assert_eq!(map.for_partial("main"), "m");
        assert_eq!(map.for_partial("gallery"), "");
    }
}
