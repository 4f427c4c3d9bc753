//! Parameter validation against a tool's JSON Schema.
//!
//! Only the subset of JSON Schema that tool definitions use is checked:
//! `required`, per-property `type`, numeric `minimum`/`maximum`, and `enum`. Missing
//! optional properties receive their `default`.

use anyhow::{bail, Result};
use serde_json::Value;

pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!(
            "parameters must be an object, got {}",
            json_type_name(other)
        ),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for req_field in &required {
        if !params_obj.contains_key(*req_field) {
            bail!("missing required parameter: {}", req_field);
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                );
            }
        }

        if let (Some(minimum), Some(n)) = (
            prop_schema.get("minimum").and_then(|m| m.as_f64()),
            value.as_f64(),
        ) {
            if n < minimum {
                bail!(
                    "parameter '{}' must be >= {}, got {}",
                    prop_name,
                    minimum,
                    value
                );
            }
        }

        if let (Some(maximum), Some(n)) = (
            prop_schema.get("maximum").and_then(|m| m.as_f64()),
            value.as_f64(),
        ) {
            if n > maximum {
                bail!(
                    "parameter '{}' must be <= {}, got {}",
                    prop_name,
                    maximum,
                    value
                );
            }
        }

        if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !enum_values.contains(value) {
                let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

/// Return a human-readable name for a JSON value's type.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
