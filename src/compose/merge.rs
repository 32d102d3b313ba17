//! Status, header and cookie propagation from fragments to the page.

use std::time::SystemTime;

use super::sink::ResponseHead;
use crate::fragment::ReplaceSet;
use crate::gateway::{FragmentResponse, ResponseCookie};

pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

pub fn is_permanent_redirect(status: u16) -> bool {
    matches!(status, 301 | 308)
}

/// Statuses an opted-in fragment may still replace with a redirect.
pub fn is_neutral(status: u16) -> bool {
    matches!(status, 200 | 404)
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name,
        "connection"
            | "keep-alive"
            | "transfer-encoding"
            | "content-length"
            | "te"
            | "trailer"
            | "upgrade"
            | "proxy-authenticate"
            | "proxy-authorization"
    )
}

/// Page response under construction.
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<ResponseCookie>,
    now: SystemTime,
}

impl ResponseState {
    pub fn new(now: SystemTime) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
            now,
        }
    }

    /// Fold in one waited fragment. Call in declaration order.
    pub fn apply(&mut self, set: &ReplaceSet, response: &FragmentResponse) {
        if set.is_primary() {
            if !is_redirect(response.status) {
                self.remove_header("location");
            }
            self.status = response.status;
            self.merge_headers(response, true);
            self.merge_cookies(response);
        } else if set.config.redirect {
            if is_neutral(self.status) && is_redirect(response.status) {
                self.status = response.status;
                if let Some(location) = response.header("location") {
                    self.set_header("location", location);
                }
            }
            self.merge_headers(response, false);
            self.merge_cookies(response);
        }
    }

    pub fn is_permanent_redirect(&self) -> bool {
        is_permanent_redirect(self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn into_head(self, chunked: bool) -> ResponseHead {
        let mut headers = self.headers;
        if !headers.iter().any(|(k, _)| k == "content-type") {
            headers.insert(0, ("content-type".into(), "text/html; charset=utf-8".into()));
        }
        headers.extend(
            self.cookies
                .iter()
                .map(|c| ("set-cookie".to_string(), c.to_header_value())),
        );
        ResponseHead {
            status: self.status,
            headers,
            chunked,
        }
    }

    fn merge_headers(&mut self, response: &FragmentResponse, with_location: bool) {
        for (name, value) in &response.headers {
            let name = name.to_ascii_lowercase();
            if is_hop_by_hop(&name) || (name == "location" && !with_location) {
                continue;
            }
            if name == "set-cookie" {
                self.headers.push((name, value.clone()));
            } else {
                self.set_header(&name, value);
            }
        }
    }

    fn merge_cookies(&mut self, response: &FragmentResponse) {
        for cookie in &response.cookies {
            self.cookies.retain(|c| c.name != cookie.name);
            self.cookies.push(cookie.clone().normalized(self.now));
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| k != name);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fragment::{Classification, FragmentIdentity};
    use crate::gateway::{CookieExpiry, FragmentConfig};

    fn set(name: &str, classification: Classification, redirect: bool) -> ReplaceSet {
        ReplaceSet {
            fragment: FragmentIdentity::new("G", name),
            classification,
            version: "1".into(),
            config: FragmentConfig {
                redirect,
                ..Default::default()
            },
            items: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(100)
    }

    fn redirect(status: u16, to: &str) -> FragmentResponse {
        FragmentResponse::ok([("main", "")])
            .with_status(status)
            .with_header("location", to)
    }

    #[test]
    fn test_primary_status_wins() {
        let mut state = ResponseState::new(now());
        state.apply(
            &set("p", Classification::Primary, false),
            &FragmentResponse::ok([("main", "")]).with_status(404),
        );
        assert_eq!(state.status, 404);
    }

    #[test]
    fn test_non_primary_without_opt_in_is_ignored() {
        let mut state = ResponseState::new(now());
        state.apply(&set("w", Classification::Waited, false), &redirect(302, "/x"));
        assert_eq!(state.status, 200);
        assert_eq!(state.header("location"), None);
    }

    #[test]
    fn test_opted_in_redirect_on_neutral_status() {
        let mut state = ResponseState::new(now());
        state.apply(&set("w", Classification::Waited, true), &redirect(302, "/login"));
        assert_eq!(state.status, 302);
        assert_eq!(state.header("location"), Some("/login"));

        // status no longer neutral: later opted-in redirects are ignored
        state.apply(&set("v", Classification::Waited, true), &redirect(301, "/other"));
        assert_eq!(state.status, 302);
        assert_eq!(state.header("location"), Some("/login"));
    }

    #[test]
    fn test_opted_in_non_redirect_keeps_status() {
        let mut state = ResponseState::new(now());
        state.apply(
            &set("w", Classification::Waited, true),
            &FragmentResponse::ok([("main", "")]).with_status(500),
        );
        assert_eq!(state.status, 200);
    }

    #[test]
    fn test_primary_redirect_overrides_earlier_redirect() {
        let mut state = ResponseState::new(now());
        state.apply(&set("w", Classification::Waited, true), &redirect(302, "/a"));
        state.apply(&set("p", Classification::Primary, false), &redirect(301, "/b"));
        assert_eq!(state.status, 301);
        assert_eq!(state.header("location"), Some("/b"));
        assert!(state.is_permanent_redirect());
    }

    #[test]
    fn test_primary_non_redirect_drops_location() {
        let mut state = ResponseState::new(now());
        state.apply(&set("w", Classification::Waited, true), &redirect(302, "/a"));
        state.apply(
            &set("p", Classification::Primary, false),
            &FragmentResponse::ok([("main", "")]),
        );
        assert_eq!(state.status, 200);
        assert_eq!(state.header("location"), None);
    }

    #[test]
    fn test_hop_by_hop_headers_skipped() {
        let mut state = ResponseState::new(now());
        let response = FragmentResponse::ok([("main", "")])
            .with_header("Connection", "close")
            .with_header("X-Cache", "hit");
        state.apply(&set("p", Classification::Primary, false), &response);
        let head = state.into_head(false);
        assert_eq!(head.header("connection"), None);
        assert_eq!(head.header("x-cache"), Some("hit"));
        assert_eq!(head.header("content-type"), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_cookie_expiry_normalized() {
        let mut state = ResponseState::new(now());
        let response = FragmentResponse::ok([("main", "")]).with_cookie(
            ResponseCookie::new("sid", "abc").expires_after(Duration::from_secs(60)),
        );
        state.apply(&set("p", Classification::Primary, false), &response);
        assert_eq!(
            state.cookies[0].expires,
            Some(CookieExpiry::At(SystemTime::UNIX_EPOCH + Duration::from_secs(160)))
        );
        let head = state.into_head(true);
        assert_eq!(
            head.header("set-cookie"),
            Some("sid=abc; Expires=Thu, 01 Jan 1970 00:02:40 GMT")
        );
        assert!(head.chunked);
    }
}
