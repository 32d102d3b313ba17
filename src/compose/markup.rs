//! Markup the engine writes around fragments.
//!
//! Event names and the `$p` call are a contract with the browser runtime.

use serde_json::{Map, Value};

use crate::utils::html::escape_attr;

const PAGE_LOAD: &str = r#"<script>PuzzleJs.emit("ON_PAGE_LOAD");</script>"#;

pub fn library_script(src: &str) -> String {
    format!(
        r#"<script src="{}" type="text/javascript"></script>"#,
        escape_attr(src)
    )
}

pub fn stylesheet(href: &str) -> String {
    format!(r#"<link rel="stylesheet" href="{}">"#, escape_attr(href))
}

pub fn page_load_script() -> &'static str {
    PAGE_LOAD
}

/// JSON that is safe inside a `<script>` element.
fn script_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

/// One `ON_VARIABLES` emit per model key, or `None` for an empty model.
pub fn model_script(fragment: &str, model: &Map<String, Value>) -> Option<String> {
    if model.is_empty() {
        return None;
    }
    let name = script_json(fragment);
    let mut out = String::from("<script>");
    for (key, value) in model {
        out.push_str(&format!(
            r#"PuzzleJs.emit("ON_VARIABLES",{},{},{});"#,
            name,
            script_json(key),
            script_json(value)
        ));
    }
    out.push_str("</script>");
    Some(out)
}

/// Hidden chunk plus the call moving it into its container.
pub fn chunk(fragment: &str, key: &str, content: &str) -> String {
    format!(
        r#"<div style="display: none;" puzzle-fragment="{fragment}" puzzle-chunk-key="{key}">{content}</div><script>$p('[puzzle-chunk="{key}"]','[puzzle-chunk-key="{key}"]');</script>"#
    )
}

/// Insert `extra` before the last `</body>`, or append it.
pub fn insert_before_body_end(html: &mut String, extra: &str) {
    if extra.is_empty() {
        return;
    }
    match html.rfind("</body>") {
        Some(at) => html.insert_str(at, extra),
        None => html.push_str(extra),
    }
}

/// Split off a trailing `</body>` / `</html>` so the stream stays open.
pub fn split_document_end(html: &str) -> (&str, &str) {
    let mut cut = html.trim_end().len();
    if let Some(rest) = html[..cut].strip_suffix("</html>") {
        cut = rest.trim_end().len();
    }
    if let Some(rest) = html[..cut].strip_suffix("</body>") {
        cut = rest.len();
    }
    html.split_at(cut)
}

/// `<puzzle-script>` survives composition untouched; the browser gets a
/// plain `<script>`.
pub fn restore_scripts(html: &str) -> String {
    html.replace("<puzzle-script", "<script")
        .replace("</puzzle-script>", "</script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_script() {
        let model = json!({ "price": 10, "html": "</script>" });
        let script = model_script("product", model.as_object().unwrap()).unwrap();
        assert_eq!(
            script,
            r#"<script>PuzzleJs.emit("ON_VARIABLES","product","price",10);PuzzleJs.emit("ON_VARIABLES","product","html","<\/script>");</script>"#
        );
        assert!(model_script("product", &Map::new()).is_none());
    }

    #[test]
    fn test_chunk_markup() {
        assert_eq!(
            chunk("product", "product_main", "X"),
            r#"<div style="display: none;" puzzle-fragment="product" puzzle-chunk-key="product_main">X</div><script>$p('[puzzle-chunk="product_main"]','[puzzle-chunk-key="product_main"]');</script>"#
        );
    }

    #[test]
    fn test_split_document_end() {
        assert_eq!(split_document_end("<body>x</body></html>"), ("<body>x", "</body></html>"));
        assert_eq!(split_document_end("<body>x</body>\n</html>\n"), ("<body>x", "</body>\n</html>\n"));
        assert_eq!(split_document_end("<div>x</div>"), ("<div>x</div>", ""));
    }

    #[test]
    fn test_insert_before_body_end() {
        let mut html = "<body>x</body></html>".to_string();
        insert_before_body_end(&mut html, "<i/>");
        assert_eq!(html, "<body>x<i/></body></html>");
        let mut bare = "<div></div>".to_string();
        insert_before_body_end(&mut bare, "<i/>");
        assert_eq!(bare, "<div></div><i/>");
    }

    #[test]
    fn test_restore_scripts() {
        assert_eq!(
            restore_scripts("<puzzle-script>a()</puzzle-script>"),
            "<script>a()</script>"
        );
    }
}
