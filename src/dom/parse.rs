//! Tolerant HTML reader.
//!
//! Not a conforming HTML parser: no implied end tags, no foster parenting.
//! Unknown closing tags are ignored and open elements are closed at EOF.
//! What it does guarantee is that `${...}` markers are read as a unit, both
//! in text and inside tags, so expressions may contain `<`, `>` or quotes.

use super::{Attributes, Element, Node};
use crate::template::scan;
use crate::utils::html::{is_raw_text_element, is_void_element, parse_attributes};

/// Parse `src` into a node list.
pub fn parse(src: &str) -> Vec<Node> {
    let mut parser = Parser {
        src,
        pos: 0,
        text: String::new(),
        stack: Vec::new(),
        root: Vec::new(),
    };
    parser.run();
    parser.root
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    text: String,
    stack: Vec<Element>,
    root: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn run(&mut self) {
        let src: &'a str = self.src;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'$' if bytes.get(self.pos + 1) == Some(&b'{') && !self.escaped() => self.marker(),
                b'<' => self.tag(),
                _ => self.advance_text(),
            }
        }
        self.flush_text();
        while let Some(el) = self.stack.pop() {
            self.push(Node::Element(el));
        }
    }

    fn escaped(&self) -> bool {
        self.pos > 0 && self.src.as_bytes()[self.pos - 1] == b'\\'
    }

    fn advance_text(&mut self) {
        let rest = &self.src[self.pos..];
        // Stop at the next byte that may start markup.
        let len = rest.as_bytes()[1..]
            .iter()
            .position(|b| matches!(b, b'<' | b'$'))
            .map_or(rest.len(), |i| i + 1);
        self.text.push_str(&rest[..len]);
        self.pos += len;
    }

    fn marker(&mut self) {
        match scan::expression_end(self.src, self.pos) {
            Some(end) => {
                self.flush_text();
                self.push(Node::Raw(self.src[self.pos..end].to_string()));
                self.pos = end;
            }
            None => {
                // unterminated: leave it to the template compiler to report
                self.text.push_str(&self.src[self.pos..]);
                self.pos = self.src.len();
            }
        }
    }

    fn tag(&mut self) {
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        if rest.starts_with("<!--") {
            self.flush_text();
            self.pos = rest
                .find("-->")
                .map_or(self.src.len(), |i| self.pos + i + 3);
            return;
        }
        if rest.starts_with("<!") {
            self.flush_text();
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            self.push(Node::Raw(rest[..end].to_string()));
            self.pos += end;
            return;
        }
        if let Some(after) = rest.strip_prefix("</")
            && after.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            self.flush_text();
            let end = after.find('>').map_or(after.len(), |i| i + 1);
            let name = after[..end]
                .trim_end_matches('>')
                .trim()
                .to_ascii_lowercase();
            self.pos += 2 + end;
            self.close(&name);
            return;
        }
        if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.flush_text();
            self.open();
            return;
        }
        self.text.push('<');
        self.pos += 1;
    }

    fn open(&mut self) {
        let start = self.pos + 1;
        let name_len = self.src[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')))
            .unwrap_or(self.src.len() - start);
        let tag = self.src[start..start + name_len].to_ascii_lowercase();

        let attrs_start = start + name_len;
        let close = tag_end(self.src, attrs_start);
        let mut attr_src = self.src[attrs_start..close].trim_end();
        let self_closing = attr_src.ends_with('/');
        if self_closing {
            attr_src = &attr_src[..attr_src.len() - 1];
        }
        self.pos = (close + 1).min(self.src.len());

        let mut el = Element::new(tag);
        el.attrs = parse_attributes(attr_src)
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect::<Attributes>();

        if is_void_element(&el.tag) || self_closing {
            self.push(Node::Element(el));
            return;
        }

        if is_raw_text_element(&el.tag) {
            let src: &'a str = self.src;
            let body = &src[self.pos..];
            let end = find_close_tag(body, &el.tag).unwrap_or(body.len());
            if end > 0 {
                el.children.push(Node::Raw(body[..end].to_string()));
            }
            self.pos += end;
            let rest = &src[self.pos..];
            self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
            self.push(Node::Element(el));
            return;
        }

        self.stack.push(el);
    }

    fn close(&mut self, tag: &str) {
        let Some(index) = self.stack.iter().rposition(|el| el.tag == tag) else {
            return;
        };
        while self.stack.len() > index {
            if let Some(el) = self.stack.pop() {
                self.push(Node::Element(el));
            }
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.push(Node::Text(text));
        }
    }
}

/// Index of the `>` ending a start tag, skipping quoted values and markers.
fn tag_end(src: &str, from: usize) -> usize {
    let bytes = src.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return i,
                _ => {}
            },
        }
        if b == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = scan::expression_end(src, i) {
                i = end;
                continue;
            }
        }
        i += 1;
    }
    bytes.len()
}

/// Byte offset of `</tag` (ASCII case-insensitive) in `body`.
fn find_close_tag(body: &str, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    let lower = body.to_ascii_lowercase();
    lower.find(&needle)
}
