//! HTTP response handlers.

use anyhow::Result;
use crossbeam::channel::Receiver;
use tiny_http::{Header, Request, Response, StatusCode};

use super::body::{ChannelBody, Frame};
use crate::compose::ResponseHead;
use crate::debug;

const PLAIN: &str = "text/plain; charset=utf-8";

/// Respond with whatever the composing task sends.
///
/// Chunked heads stream the body as it arrives; other heads wait for the
/// end frame and send a sized body.
pub fn respond_composed(request: Request, rx: Receiver<Frame>) -> Result<u16> {
    let head = match rx.recv() {
        Ok(Frame::Head(head)) => head,
        // the composing task died before deciding on a head
        _ => {
            send_plain(request, 500, "500 Internal Server Error")?;
            return Ok(500);
        }
    };

    let status = head.status;
    let headers = to_headers(&head);
    let body = ChannelBody::new(rx);
    if head.chunked {
        let response = Response::new(StatusCode(status), headers, body, None, None)
            .with_chunked_threshold(0);
        request.respond(response)?;
    } else {
        let mut response = Response::from_data(body.collect()).with_status_code(StatusCode(status));
        for header in headers {
            response.add_header(header);
        }
        request.respond(response)?;
    }
    Ok(status)
}

/// Respond with 404 Not Found.
pub fn respond_not_found(request: Request) -> Result<()> {
    send_plain(request, 404, "404 Not Found")
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_plain(request, 503, "503 Service Unavailable")
}

fn send_plain(request: Request, status: u16, body: &str) -> Result<()> {
    let mut response = Response::from_string(body).with_status_code(StatusCode(status));
    if let Some(header) = make_header("content-type", PLAIN) {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn to_headers(head: &ResponseHead) -> Vec<Header> {
    head.headers
        .iter()
        .filter_map(|(name, value)| make_header(name, value))
        .collect()
}

fn make_header(name: &str, value: &str) -> Option<Header> {
    let header = Header::from_bytes(name.as_bytes(), value.as_bytes()).ok();
    if header.is_none() {
        debug!("serve"; "dropped invalid header `{}`", name);
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_keep_repeats() {
        let head = ResponseHead {
            status: 200,
            headers: vec![
                ("set-cookie".into(), "a=1".into()),
                ("set-cookie".into(), "b=2".into()),
                ("x-note".into(), "caf\u{e9}".into()),
            ],
            chunked: true,
        };
        let headers = to_headers(&head);
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.field.equiv("Set-Cookie")));
    }
}
