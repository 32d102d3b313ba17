//! `${...}` marker scanning.
//!
//! The scanner is shared by the template compiler and the page parser: the
//! parser must treat an expression as opaque so that `<` or `>` inside
//! `${a < b}` never opens a tag.
//!
//! Marker grammar:
//!
//! - `${` opens a marker, `\${` is an escaped literal `${`
//! - a single leading `{` or `}` right after `${` belongs to the inner text,
//!   so block syntax like `${} else {}` and `${}}` reads naturally
//! - the marker ends at the first `}` outside quotes

use std::borrow::Cow;

/// A piece of template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece<'a> {
    /// Literal text (escapes already resolved).
    Text(Cow<'a, str>),
    /// Inner text of a `${...}` marker.
    Expr(&'a str),
}

/// Returns true if `src` contains an unescaped `${` marker.
pub fn has_marker(src: &str) -> bool {
    let bytes = src.as_bytes();
    let mut i = 0;
    while let Some(pos) = find_open(bytes, i) {
        if !is_escaped(bytes, pos) {
            return true;
        }
        i = pos + 2;
    }
    false
}

/// Split `src` into literal text and marker pieces.
///
/// Returns the byte offset of the first unterminated marker on failure.
pub fn split(src: &str) -> Result<Vec<Piece<'_>>, usize> {
    let bytes = src.as_bytes();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut text_start = 0;
    let mut borrowed = true;
    let mut i = 0;

    while let Some(pos) = find_open(bytes, i) {
        if is_escaped(bytes, pos) {
            // drop the backslash, keep `${` literally
            text.push_str(&src[text_start..pos - 1]);
            text.push_str("${");
            borrowed = false;
            i = pos + 2;
            text_start = i;
            continue;
        }

        let end = expression_end(src, pos).ok_or(pos)?;
        text.push_str(&src[text_start..pos]);
        flush_text(&mut pieces, &mut text, src, &mut borrowed);
        pieces.push(Piece::Expr(&src[pos + 2..end - 1]));
        i = end;
        text_start = end;
    }

    text.push_str(&src[text_start..]);
    flush_text(&mut pieces, &mut text, src, &mut borrowed);
    Ok(pieces)
}

fn flush_text<'a>(pieces: &mut Vec<Piece<'a>>, text: &mut String, src: &'a str, borrowed: &mut bool) {
    if text.is_empty() {
        return;
    }
    // Whole-source text with no escapes can stay borrowed.
    if *borrowed && pieces.is_empty() && text.len() == src.len() {
        pieces.push(Piece::Text(Cow::Borrowed(src)));
        text.clear();
    } else {
        pieces.push(Piece::Text(Cow::Owned(std::mem::take(text))));
    }
    *borrowed = true;
}

/// Given the index of a `$` that starts `${`, return the index just past the
/// closing `}`.
pub fn expression_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = open + 2;

    if matches!(bytes.get(i), Some(b'{' | b'}')) {
        i += 1;
    }

    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'}' => return Some(i + 1),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

#[inline]
fn find_open(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(2)
        .position(|w| w == b"${")
        .map(|p| p + from)
}

#[inline]
fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    pos > 0 && bytes[pos - 1] == b'\\'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exprs(src: &str) -> Vec<String> {
        split(src)
            .unwrap()
            .into_iter()
            .filter_map(|p| match p {
                Piece::Expr(e) => Some(e.to_string()),
                Piece::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_split_plain_text() {
        let pieces = split("<div>hello</div>").unwrap();
        assert_eq!(pieces, vec![Piece::Text(Cow::Borrowed("<div>hello</div>"))]);
    }

    #[test]
    fn test_split_interpolation() {
        let pieces = split("a${this.b}c").unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1], Piece::Expr("this.b"));
    }

    #[test]
    fn test_split_block_syntax() {
        assert_eq!(
            exprs("${if (a) {}x${} else {}y${}}"),
            vec!["if (a) {", "} else {", "}"]
        );
    }

    #[test]
    fn test_split_quoted_brace() {
        assert_eq!(exprs("${'}'}"), vec!["'}'"]);
    }

    #[test]
    fn test_split_escaped_marker() {
        let pieces = split(r"cost: \${price}").unwrap();
        assert_eq!(pieces, vec![Piece::Text(Cow::Owned("cost: ${price}".into()))]);
        assert!(!has_marker(r"cost: \${price}"));
    }

    #[test]
    fn test_split_unterminated() {
        assert_eq!(split("ok ${this.a").unwrap_err(), 3);
    }

    #[test]
    fn test_has_marker() {
        assert!(has_marker("x ${y}"));
        assert!(!has_marker("x $ {y}"));
    }
}
