//! Structured `where` filters and their translation into Weaviate's GraphQL
//! filter grammar.
//!
//! Callers hand us an arbitrary JSON value. It is converted into a
//! [`WhereValue`] tree and rendered by structural recursion:
//!
//! | JSON | GraphQL |
//! |------|---------|
//! | object | `{key: value, ...}` |
//! | array | `[a, b, ...]` |
//! | string | `"quoted"` |
//! | number / bool / null | literal |
//!
//! The one special case is the `operator` key. Weaviate distinguishes
//! enumerated operators (`Equal`, `And`, `Like`, ...) from string literals,
//! so an `operator` value shaped like an enum symbol is emitted bare.

use serde_json::Value;

/// A loosely-typed filter value with its map key order preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<WhereValue>),
    Map(Vec<(String, WhereValue)>),
}

impl From<Value> for WhereValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WhereValue::Null,
            Value::Bool(b) => WhereValue::Bool(b),
            Value::Number(n) => WhereValue::Number(n),
            Value::String(s) => WhereValue::String(s),
            Value::Array(items) => WhereValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                WhereValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl WhereValue {
    /// `{path: ["<property>"], operator: <operator>, valueText: "<value>"}`
    pub fn text_condition(property: &str, operator: &str, value: &str) -> Self {
        WhereValue::Map(vec![
            (
                "path".to_string(),
                WhereValue::List(vec![WhereValue::String(property.to_string())]),
            ),
            ("operator".to_string(), WhereValue::String(operator.to_string())),
            ("valueText".to_string(), WhereValue::String(value.to_string())),
        ])
    }

    /// Conjoin `self` with an optional extra filter.
    pub fn and(self, other: Option<&WhereValue>) -> Self {
        match other {
            None => self,
            Some(other) => WhereValue::Map(vec![
                ("operator".to_string(), WhereValue::String("And".to_string())),
                ("operands".to_string(), WhereValue::List(vec![self, other.clone()])),
            ]),
        }
    }

    /// Render this value in Weaviate's GraphQL filter grammar.
    pub fn to_graphql(&self) -> String {
        let mut out = String::new();
        self.write_graphql(&mut out);
        out
    }

    fn write_graphql(&self, out: &mut String) {
        match self {
            WhereValue::Null => out.push_str("null"),
            WhereValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            WhereValue::Number(n) => out.push_str(&n.to_string()),
            WhereValue::String(s) => out.push_str(&quote(s)),
            WhereValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_graphql(out);
                }
                out.push(']');
            }
            WhereValue::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_graphql_name(key) {
                        out.push_str(key);
                    } else {
                        out.push_str(&quote(key));
                    }
                    out.push_str(": ");
                    match value {
                        WhereValue::String(op) if key == "operator" && is_enum_symbol(op) => {
                            out.push_str(op)
                        }
                        other => other.write_graphql(out),
                    }
                }
                out.push('}');
            }
        }
    }
}

/// JSON string literal; GraphQL string escapes are a superset-compatible match.
pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

/// Leading uppercase ASCII letter, then letters, digits or `_`.
pub fn is_enum_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// GraphQL `Name`: `[_A-Za-z][_0-9A-Za-z]*`.
pub fn is_graphql_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
