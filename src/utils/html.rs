//! HTML utility functions.
//!
//! Provides common HTML processing functions:
//! - `escape_attr()` - attribute value escaping
//! - `is_void_element()` - Self-closing elements (br, img, etc.)
//! - `is_raw_text_element()` - Elements whose body is not markup
//! - `parse_attributes()` - HTML attribute string parsing

use std::borrow::Cow;

use crate::template::scan;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML attribute values.
///
/// Uses `Cow` to avoid allocation when no escaping is needed. Also neutralizes `${` so configured values never become expressions.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    match escape_with(s, &ESCAPE_CHARS) {
        Cow::Borrowed(b) if !b.contains("${") => Cow::Borrowed(b),
        other => Cow::Owned(other.replace("${", "&#36;{")),
    }
}

#[inline]
fn escape_with<'a>(s: &'a str, chars: &[char]) -> Cow<'a, str> {
    if !s.contains(chars) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

// =============================================================================
// Element Classification
// =============================================================================

/// Check if an HTML tag is a void element (no closing tag).
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Check if tag holds raw text (its body is read and written verbatim).
///
/// `puzzle-script` is the page-author spelling of a script that must
/// survive composition untouched.
#[inline]
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title" | "puzzle-script")
}

// =============================================================================
// Attribute Parsing
// =============================================================================

/// Parse HTML-style attributes from a string.
///
/// Input: `from="Browsing" name='product' partial=main primary`
/// Output: `[("from", "Browsing"), ("name", "product"), ("partial", "main"), ("primary", "")]`
///
/// `${...}` markers inside values are read as a unit, so an unquoted
/// `if=${a && b}` stays one attribute.
pub fn parse_attributes(s: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    loop {
        i = skip_ws(i);
        if i >= bytes.len() {
            break;
        }

        // Read attribute name
        let start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name = s[start..i].to_string();

        // Check for value
        let after = skip_ws(i);
        if after >= bytes.len() || bytes[after] != b'=' {
            // Boolean attribute (no value)
            attrs.push((name, String::new()));
            continue;
        }
        i = skip_ws(after + 1);

        let value = match bytes.get(i) {
            Some(&q @ (b'"' | b'\'')) => {
                let open = i + 1;
                let close = find_quote(s, open, q);
                i = (close + 1).min(bytes.len());
                s[open..close].to_string()
            }
            Some(_) => {
                // Unquoted value (read until whitespace)
                let open = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    if bytes[i] == b'$'
                        && bytes.get(i + 1) == Some(&b'{')
                        && let Some(end) = scan::expression_end(s, i)
                    {
                        i = end;
                        continue;
                    }
                    i += 1;
                }
                s[open..i].to_string()
            }
            None => String::new(),
        };
        attrs.push((name, value));
    }

    attrs
}

/// Closing quote position, skipping over markers.
fn find_quote(s: &str, from: usize, quote: u8) -> usize {
    let bytes = s.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == quote {
            return i;
        }
        if bytes[i] == b'$'
            && bytes.get(i + 1) == Some(&b'{')
            && let Some(end) = scan::expression_end(s, i)
        {
            i = end;
            continue;
        }
        i += 1;
    }
    bytes.len()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("normal"), "normal");
        assert_eq!(escape_attr("<it's>"), "&lt;it&#39;s&gt;");
        assert_eq!(escape_attr("a\"b&c"), "a&quot;b&amp;c");
        assert_eq!(escape_attr("/x?v=${1}"), "/x?v=&#36;{1}");
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("link"));
        assert!(!is_void_element("div"));
        assert!(!is_void_element("fragment"));
    }

    #[test]
    fn test_raw_text_elements() {
        assert!(is_raw_text_element("script"));
        assert!(is_raw_text_element("puzzle-script"));
        assert!(!is_raw_text_element("div"));
        assert!(!is_raw_text_element("pre"));
    }

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes(r#"a="1" b='2' c=3 disabled"#);
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0], ("a".to_string(), "1".to_string()));
        assert_eq!(attrs[1], ("b".to_string(), "2".to_string()));
        assert_eq!(attrs[2], ("c".to_string(), "3".to_string()));
        assert_eq!(attrs[3], ("disabled".to_string(), "".to_string()));
    }

    #[test]
    fn test_parse_attributes_with_markers() {
        let attrs = parse_attributes(r#"if="${this.q["a"] == 'x'}" id=${this.a + this.b} primary"#);
        assert_eq!(attrs[0], ("if".to_string(), r#"${this.q["a"] == 'x'}"#.to_string()));
        assert_eq!(attrs[1], ("id".to_string(), "${this.a + this.b}".to_string()));
        assert_eq!(attrs[2], ("primary".to_string(), "".to_string()));
    }

    #[test]
    fn test_parse_attributes_spaced_equals() {
        let attrs = parse_attributes(r#"name = "product""#);
        assert_eq!(attrs, vec![("name".to_string(), "product".to_string())]);
    }
}
