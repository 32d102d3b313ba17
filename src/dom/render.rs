//! Tree serializer.
//!
//! Whitespace runs in text collapse to a single space and whitespace-only
//! text disappears, except below `pre` and raw-text elements.

use super::{Element, Node};
use crate::utils::html::{is_raw_text_element, is_void_element};

/// Serialize nodes back to HTML.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, false, &mut out);
    }
    out
}

fn render_node(node: &Node, preserve: bool, out: &mut String) {
    match node {
        Node::Raw(raw) => out.push_str(raw),
        Node::Text(text) if preserve => out.push_str(text),
        Node::Text(text) => collapse_into(text, out),
        Node::Element(el) => render_element(el, preserve, out),
    }
}

fn render_element(el: &Element, preserve: bool, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        if value.is_empty() {
            continue;
        }
        // Values are kept as written, so pick a quote that does not occur.
        let quote = if value.contains('"') && !value.contains('\'') {
            '\''
        } else {
            '"'
        };
        out.push('=');
        out.push(quote);
        if quote == '"' {
            out.push_str(&value.replace('"', "&quot;"));
        } else {
            out.push_str(value);
        }
        out.push(quote);
    }
    out.push('>');

    if is_void_element(&el.tag) {
        return;
    }

    let preserve = preserve || el.tag == "pre" || is_raw_text_element(&el.tag);
    for child in &el.children {
        render_node(child, preserve, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn collapse_into(text: &str, out: &mut String) {
    if text.trim().is_empty() {
        return;
    }
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::{Document, Element, Node};

    #[test]
    fn test_collapses_whitespace() {
        let doc = Document::parse("<div>\n    <p>Hello   world</p>\n</div>");
        assert_eq!(doc.render(), "<div><p>Hello world</p></div>");
    }

    #[test]
    fn test_pre_is_preserved() {
        let doc = Document::parse("<pre>  a\n  b</pre>");
        assert_eq!(doc.render(), "<pre>  a\n  b</pre>");
    }

    #[test]
    fn test_void_and_boolean_attributes() {
        let doc = Document::parse(r#"<input type="checkbox" checked><br/>"#);
        assert_eq!(doc.render(), r#"<input type="checkbox" checked><br>"#);
    }

    #[test]
    fn test_self_closing_non_void_gets_end_tag() {
        let doc = Document::parse(r#"<fragment from="a" name="b"/>"#);
        assert_eq!(doc.render(), r#"<fragment from="a" name="b"></fragment>"#);
    }

    #[test]
    fn test_quote_selection() {
        let el = Element::new("div").with_attr("if", r#"${req.query["x"]}"#);
        let doc = Document {
            children: vec![Node::Element(el)],
        };
        assert_eq!(doc.render(), r#"<div if='${req.query["x"]}'></div>"#);
    }

    #[test]
    fn test_markers_untouched() {
        let doc = Document::parse("<p>${ 'a   b' }</p>");
        assert_eq!(doc.render(), "<p>${ 'a   b' }</p>");
    }

    #[test]
    fn test_script_body_untouched() {
        let src = "<script>\n  var a = 1;\n</script>";
        assert_eq!(Document::parse(src).render(), src);
    }
}
