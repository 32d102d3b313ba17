//! Response output.

/// Status line and headers, finalized before the first body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    /// Lowercase names; `set-cookie` may repeat.
    pub headers: Vec<(String, String)>,
    /// Body is streamed with chunked transfer encoding.
    pub chunked: bool,
}

impl ResponseHead {
    /// Head of a plain error page.
    pub fn error(status: u16) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
            chunked: false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Where a composed page goes.
///
/// Implementations must tolerate calls after the client went away; the
/// engine never cancels in-flight work.
pub trait ResponseSink: Send {
    fn send_head(&mut self, head: ResponseHead);

    fn write(&mut self, chunk: &str);

    /// Push written data to the client.
    fn flush(&mut self) {}

    fn end(&mut self);
}

/// Records everything; used by `puzzle render` and tests.
#[derive(Debug, Default, Clone)]
pub struct BufferedSink {
    pub head: Option<ResponseHead>,
    pub chunks: Vec<String>,
    pub flushes: usize,
    pub ended: bool,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> String {
        self.chunks.concat()
    }

    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|h| h.status)
    }
}

impl ResponseSink for BufferedSink {
    fn send_head(&mut self, head: ResponseHead) {
        if self.head.is_none() {
            self.head = Some(head);
        }
    }

    fn write(&mut self, chunk: &str) {
        if !self.ended && !chunk.is_empty() {
            self.chunks.push(chunk.to_string());
        }
    }

    fn flush(&mut self) {
        if !self.ended {
            self.flushes += 1;
        }
    }

    fn end(&mut self) {
        self.ended = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_sink_ignores_late_writes() {
        let mut sink = BufferedSink::new();
        sink.send_head(ResponseHead {
            status: 200,
            headers: vec![("set-cookie".into(), "a=1".into()), ("Set-Cookie".into(), "b=2".into())],
            chunked: false,
        });
        sink.write("a");
        sink.end();
        sink.write("b");
        assert_eq!(sink.body(), "a");
        assert_eq!(sink.status(), Some(200));
        let head = sink.head.as_ref().unwrap();
        assert_eq!(head.headers_named("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
    }
}
