//! Minimal canonical-JSON encoder.
//!
//! The chain/v1-id descriptors need byte-stable JSON with explicit key
//! order, compact separators, and `null` standing in for fields that are
//! explicitly absent — exactly what a general-purpose `HashMap`-backed
//! serializer can't promise. This builds an explicit ordered value and
//! renders it by hand instead of leaning on `serde_json`'s map iteration
//! order.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    String(String),
    /// Pre-rendered JSON fragment, used to splice in a `serde_json::Value`
    /// (e.g. an arbitrary config sub-object) without re-deriving its
    /// canonical form by hand.
    Raw(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn object(pairs: Vec<(&str, Value)>) -> Self {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Converts a parsed `serde_json::Value` into a canonical `Value`,
    /// preserving object key order (requires the `preserve_order` feature
    /// on `serde_json`, which keeps insertion order rather than sorting).
    pub fn from_serde(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(_) => Value::Raw(value.to_string()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_serde).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_serde(v)))
                    .collect(),
            ),
        }
    }

    /// Renders compact JSON: `,`/`:` separators, no whitespace, no
    /// trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::String(s) => write_escaped_string(s, out),
            Value::Raw(fragment) => out.push_str(fragment),
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.render_into(out);
                }
                out.push(']');
            }
            Value::Object(pairs) => {
                out.push('{');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_escaped_string(key, out);
                    out.push(':');
                    value.render_into(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_escaped_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_object_has_no_whitespace() {
        let v = Value::object(vec![("id", Value::str("abc")), ("parent", Value::Null)]);
        assert_eq!(v.render(), r#"{"id":"abc","parent":null}"#);
    }

    #[test]
    fn key_order_is_preserved_not_sorted() {
        let v = Value::object(vec![("b", Value::str("2")), ("a", Value::str("1"))]);
        assert_eq!(v.render(), r#"{"b":"2","a":"1"}"#);
    }

    #[test]
    fn rendering_is_byte_stable() {
        let v = Value::object(vec![("x", Value::Array(vec![Value::str("y")]))]);
        assert_eq!(v.render(), v.render());
    }

    #[test]
    fn from_serde_preserves_insertion_order() {
        let parsed: serde_json::Value =
            serde_json::from_str(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let rendered = Value::from_serde(&parsed).render();
        assert_eq!(rendered, r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn escapes_control_characters() {
        let v = Value::str("a\"b\\c\n");
        assert_eq!(v.render(), r#""a\"b\\c\n""#);
    }
}
