//! Evaluation of `${...}` inside fragment reference attributes.

use serde_json::{Map, Value, json};

use super::expr::{Expr, Scope, display, truthy};
use super::scan::{self, Piece};
use crate::debug;

/// Attribute values after evaluation; forwarded to the fragment fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardedAttributes(Map<String, Value>);

impl ForwardedAttributes {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Render a value as text (missing keys are empty).
    pub fn text(&self, key: &str) -> String {
        self.0.get(key).map(display).unwrap_or_default()
    }
}

/// True unless an `if` attribute evaluated to a falsy value.
pub fn condition_holds(attributes: &ForwardedAttributes) -> bool {
    attributes.get("if").is_none_or(truthy)
}

/// Evaluate every attribute against the page bindings (`this`) and, when
/// given, the request (`req`).
///
/// A value made of exactly one `${e}` keeps the JSON type of `e`; mixed
/// values become strings. A failing `if` evaluates to `false`; any other
/// failing attribute keeps its raw text.
pub fn process_expression<'a, I>(
    attributes: I,
    bindings: &Value,
    request: Option<&Value>,
) -> ForwardedAttributes
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let context = json!({
        "this": bindings,
        "req": request.cloned().unwrap_or(Value::Null),
    });
    let scope = Scope::new(&context);

    let mut out = Map::new();
    for (key, raw) in attributes {
        let value = match evaluate(raw, &scope) {
            Ok(value) => value,
            Err(message) if key == "if" => {
                debug!("fragment"; "condition `{}` treated as false: {}", raw, message);
                Value::Bool(false)
            }
            Err(message) => {
                debug!("fragment"; "attribute `{}` kept raw: {}", key, message);
                Value::String(raw.to_string())
            }
        };
        out.insert(key.to_string(), value);
    }
    ForwardedAttributes(out)
}

fn evaluate(raw: &str, scope: &Scope<'_>) -> Result<Value, String> {
    if !raw.contains("${") {
        return Ok(Value::String(raw.to_string()));
    }

    let pieces = scan::split(raw).map_err(|offset| format!("unterminated `${{` at {offset}"))?;
    let eval = |inner: &str| {
        Expr::parse(inner.trim())
            .and_then(|e| e.eval(scope))
            .map_err(|e| e.to_string())
    };

    if let [Piece::Expr(inner)] = pieces.as_slice() {
        return eval(*inner);
    }

    let mut text = String::new();
    for piece in &pieces {
        match piece {
            Piece::Text(t) => text.push_str(t),
            Piece::Expr(inner) => text.push_str(&display(&eval(*inner)?)),
        }
    }
    Ok(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        pairs.to_vec()
    }

    #[test]
    fn test_plain_values_pass_through() {
        let out = process_expression(attrs(&[("name", "product")]), &json!({}), None);
        assert_eq!(out.get("name"), Some(&json!("product")));
        assert!(condition_holds(&out));
    }

    #[test]
    fn test_single_expression_keeps_type() {
        let bindings = json!({ "id": 42, "show": true });
        let out = process_expression(attrs(&[("id", "${this.id}"), ("if", "${this.show}")]), &bindings, None);
        assert_eq!(out.get("id"), Some(&json!(42)));
        assert!(condition_holds(&out));
    }

    #[test]
    fn test_mixed_value_becomes_string() {
        let bindings = json!({ "id": 42 });
        let out = process_expression(attrs(&[("path", "/p/${this.id}/detail")]), &bindings, None);
        assert_eq!(out.text("path"), "/p/42/detail");
    }

    #[test]
    fn test_false_string_condition() {
        let out = process_expression(attrs(&[("if", "${'false'}")]), &json!({}), None);
        assert!(!condition_holds(&out));
        let out = process_expression(attrs(&[("if", "false")]), &json!({}), None);
        assert!(!condition_holds(&out));
    }

    #[test]
    fn test_failing_condition_is_false() {
        let out = process_expression(attrs(&[("if", "${this.a.b.c}")]), &json!({}), None);
        assert_eq!(out.get("if"), Some(&json!(false)));
        assert!(!condition_holds(&out));
    }

    #[test]
    fn test_failing_attribute_kept_raw() {
        let out = process_expression(attrs(&[("sku", "${this.a.b}")]), &json!({}), None);
        assert_eq!(out.get("sku"), Some(&json!("${this.a.b}")));
    }

    #[test]
    fn test_request_binding() {
        let request = json!({ "query": { "color": "red" } });
        let out = process_expression(attrs(&[("color", "${req.query.color}")]), &json!({}), Some(&request));
        assert_eq!(out.get("color"), Some(&json!("red")));
    }
}
