//! Minimal page tree.
//!
//! Enough HTML structure to find fragment references, rewrite them into
//! containers and serialize the result again. `${...}` markers are kept as
//! opaque [`Node::Raw`] nodes so that whitespace collapsing and tag scanning
//! never touch expression text.
//!
//! # Module Structure
//!
//! - `parse` - tolerant, marker-aware HTML reader
//! - `render` - serializer with whitespace collapsing

mod parse;
mod render;

use smallvec::SmallVec;

pub use parse::parse;
pub use render::render;

/// Attribute list; most page elements carry only a few.
pub type Attributes = SmallVec<[(String, String); 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Text subject to whitespace collapsing.
    Text(String),
    /// Markup written out verbatim (markers, doctype, raw-text bodies).
    Raw(String),
}

impl Node {
    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }
}

/// A parsed page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    pub fn parse(src: &str) -> Self {
        Self {
            children: parse(src),
        }
    }

    pub fn render(&self) -> String {
        render(&self.children)
    }

    /// First element with `tag`, depth-first.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        find_in(&self.children, tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut Element> {
        find_in_mut(&mut self.children, tag)
    }

    /// Visit every element in document order; the flag tells whether the
    /// element sits inside `<head>`.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Element, bool)) {
        visit_in(&self.children, false, f);
    }

    /// Replace elements in place. When `f` returns nodes the element is
    /// swapped for them and not descended into.
    pub fn replace(&mut self, f: &mut dyn FnMut(&Element, bool) -> Option<Vec<Node>>) {
        replace_in(&mut self.children, false, f);
    }
}

fn find_in<'a>(nodes: &'a [Node], tag: &str) -> Option<&'a Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(el) if el.tag == tag => Some(el),
        Node::Element(el) => find_in(&el.children, tag),
        _ => None,
    })
}

fn find_in_mut<'a>(nodes: &'a mut [Node], tag: &str) -> Option<&'a mut Element> {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.tag == tag {
                return Some(el);
            }
            if let Some(found) = find_in_mut(&mut el.children, tag) {
                return Some(found);
            }
        }
    }
    None
}

fn visit_in<'a>(nodes: &'a [Node], in_head: bool, f: &mut dyn FnMut(&'a Element, bool)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el, in_head);
            visit_in(&el.children, in_head || el.tag == "head", f);
        }
    }
}

fn replace_in(
    nodes: &mut Vec<Node>,
    in_head: bool,
    f: &mut dyn FnMut(&Element, bool) -> Option<Vec<Node>>,
) {
    let mut i = 0;
    while i < nodes.len() {
        let replacement = match &mut nodes[i] {
            Node::Element(el) => match f(el, in_head) {
                Some(replacement) => Some(replacement),
                None => {
                    let nested = in_head || el.tag == "head";
                    replace_in(&mut el.children, nested, f);
                    None
                }
            },
            _ => None,
        };
        match replacement {
            Some(replacement) => {
                let len = replacement.len();
                nodes.splice(i..=i, replacement);
                i += len;
            }
            None => i += 1,
        }
    }
}
