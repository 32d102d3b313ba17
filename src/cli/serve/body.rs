//! Channel between the composing task and the HTTP writer.
//!
//! The composition runs on the tokio runtime and writes into a
//! [`ChannelSink`]; the request thread turns the receiving end into a
//! [`ChannelBody`] that tiny_http copies to the socket.

use std::io::{self, Read};

use crossbeam::channel::{Receiver, Sender, unbounded};

use crate::compose::{ResponseHead, ResponseSink};

/// One message from the composing task.
#[derive(Debug)]
pub enum Frame {
    Head(ResponseHead),
    Data(Vec<u8>),
    End,
}

pub fn channel() -> (ChannelSink, Receiver<Frame>) {
    let (tx, rx) = unbounded();
    (
        ChannelSink {
            tx,
            pending: Vec::new(),
            ended: false,
        },
        rx,
    )
}

/// Sink side. Writes are batched until `flush` or `end`.
pub struct ChannelSink {
    tx: Sender<Frame>,
    pending: Vec<u8>,
    ended: bool,
}

impl ChannelSink {
    fn send_pending(&mut self) {
        if !self.pending.is_empty() {
            // a closed receiver means the client went away
            let _ = self.tx.send(Frame::Data(std::mem::take(&mut self.pending)));
        }
    }
}

impl ResponseSink for ChannelSink {
    fn send_head(&mut self, head: ResponseHead) {
        let _ = self.tx.send(Frame::Head(head));
    }

    fn write(&mut self, chunk: &str) {
        if !self.ended {
            self.pending.extend_from_slice(chunk.as_bytes());
        }
    }

    fn flush(&mut self) {
        if !self.ended {
            self.send_pending();
        }
    }

    fn end(&mut self) {
        if !self.ended {
            self.send_pending();
            self.ended = true;
            let _ = self.tx.send(Frame::End);
        }
    }
}

/// Reader side, positioned after the head frame.
pub struct ChannelBody {
    rx: Receiver<Frame>,
    current: Vec<u8>,
    offset: usize,
    done: bool,
}

impl ChannelBody {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            offset: 0,
            done: false,
        }
    }

    /// Read everything up to the end frame.
    pub fn collect(mut self) -> Vec<u8> {
        let mut body = Vec::new();
        let _ = self.read_to_end(&mut body);
        body
    }
}

impl Read for ChannelBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.current.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Frame::Data(data)) => {
                    self.current = data;
                    self.offset = 0;
                }
                // a dropped sender ends the body as well
                Ok(Frame::End) | Err(_) => self.done = true,
                Ok(Frame::Head(_)) => {}
            }
        }

        let n = buf.len().min(self.current.len() - self.offset);
        buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flushed_writes_arrive_in_order() {
        let (mut sink, rx) = channel();
        sink.send_head(ResponseHead::error(500));
        sink.write("<h1>");
        sink.write("oops");
        sink.flush();
        sink.write("</h1>");
        sink.end();
        sink.write("late");

        let Ok(Frame::Head(head)) = rx.recv() else {
            panic!("expected head first");
        };
        assert_eq!(head.status, 500);
        assert_eq!(ChannelBody::new(rx).collect(), b"<h1>oops</h1>");
    }

    #[test]
    fn test_dropped_sink_ends_body() {
        let (mut sink, rx) = channel();
        sink.write("partial");
        sink.flush();
        drop(sink);
        assert_eq!(ChannelBody::new(rx).collect(), b"partial");
    }

    #[test]
    fn test_small_reads() {
        let (mut sink, rx) = channel();
        sink.write("abcdef");
        sink.end();
        let mut body = ChannelBody::new(rx);
        let mut buf = [0u8; 4];
        assert_eq!(body.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(body.read(&mut buf).unwrap(), 2);
        assert_eq!(body.read(&mut buf).unwrap(), 0);
    }
}
