//! Minimal JSON Schema validation for tool parameters.
//!
//! Supports the subset tool schemas here actually use: `required`,
//! per-property `type`, `minLength`, `minimum`, and `maximum`. Integral
//! floats (`5.0`) are accepted for `integer` properties and normalized to
//! integers in the returned object.

use serde_json::{Map, Value};

use crate::error::{HrKbError, HrKbResult};

/// Validate `params` against `schema`, returning the normalized parameters.
///
/// # Errors
///
/// Returns [`HrKbError::InvalidInput`] naming the first offending parameter.
pub fn validate_params(schema: &Value, params: &Value) -> HrKbResult<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(invalid(format!(
                "parameters must be an object, got {}",
                json_type_name(other)
            )))
        }
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
            return Err(invalid(format!("missing required parameter: {}", req_field)));
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => as_integer(value).is_some(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                return Err(invalid(format!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                )));
            }
            if expected_type == "integer" {
                if let Some(n) = as_integer(value) {
                    result.insert(prop_name.clone(), Value::from(n));
                }
            }
        }

        if let (Some(min_len), Some(s)) = (
            prop_schema.get("minLength").and_then(|m| m.as_u64()),
            value.as_str(),
        ) {
            if (s.chars().count() as u64) < min_len {
                return Err(invalid(format!(
                    "parameter '{}' must be at least {} character(s) long",
                    prop_name, min_len
                )));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = prop_schema.get("minimum").and_then(|m| m.as_f64()) {
                if n < min {
                    return Err(invalid(format!(
                        "parameter '{}' must be >= {}, got {}",
                        prop_name, min, value
                    )));
                }
            }
            if let Some(max) = prop_schema.get("maximum").and_then(|m| m.as_f64()) {
                if n > max {
                    return Err(invalid(format!(
                        "parameter '{}' must be <= {}, got {}",
                        prop_name, max, value
                    )));
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn invalid(message: String) -> HrKbError {
    HrKbError::InvalidInput(message)
}

/// The integer value of `value`, accepting floats with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
