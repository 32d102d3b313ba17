//! Incoming request as seen by pages and expressions.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde_json::{Value, json};

/// Request data exposed to expressions as `req`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Lowercase names.
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl RequestContext {
    /// Build from a method and a request target (`/path?query`).
    pub fn new(method: &str, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        Self {
            method: method.to_ascii_uppercase(),
            path: decode(path),
            query: parse_query(query),
            ..Default::default()
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    /// Add a header; a `cookie` header also fills [`Self::cookies`].
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.insert(name, value.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn to_value(&self) -> Value {
        json!({
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "headers": self.headers,
            "cookies": self.cookies,
        })
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(&k.replace('+', " ")), decode(&v.replace('+', " ")))
        })
        .collect()
}

/// Parse a `Cookie` header value.
pub fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), decode(v.trim())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query() {
        let req = RequestContext::get("/product%20list?color=dark+red&size=&flag");
        assert_eq!(req.path, "/product list");
        assert_eq!(req.query["color"], "dark red");
        assert_eq!(req.query["size"], "");
        assert_eq!(req.query["flag"], "");
    }

    #[test]
    fn test_cookie_header() {
        let req = RequestContext::get("/").with_header("Cookie", "puzzle_product_version=2; sid=a%3Db");
        assert_eq!(req.cookies["puzzle_product_version"], "2");
        assert_eq!(req.cookies["sid"], "a=b");
        assert!(req.headers.contains_key("cookie"));
    }

    #[test]
    fn test_to_value() {
        let value = RequestContext::get("/p?id=7").to_value();
        assert_eq!(value["method"], "GET");
        assert_eq!(value["query"]["id"], "7");
        assert!(value["cookies"].as_object().unwrap().is_empty());
    }
}
