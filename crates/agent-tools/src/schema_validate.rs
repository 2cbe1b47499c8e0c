// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! A small JSON-Schema-subset validator for tool arguments.
//!
//! Tool schemas in this codebase only ever use `type`, `required`,
//! `properties`, `enum`, `minimum`/`maximum`, and `pattern` — there is no
//! production precedent in this workspace for a full-spec validator crate,
//! so this hand-rolls exactly the subset the built-in tools declare. If a
//! richer schema ever shows up, reach for a real validator crate instead of
//! growing this one.
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// Validates `value` against `schema`, collecting every violation rather
/// than stopping at the first.
pub fn validate(schema: &Value, value: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_node(schema, value, "$", &mut errors);
    errors
}

fn validate_node(schema: &Value, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(ty) = schema_obj.get("type").and_then(Value::as_str) {
        if !type_matches(ty, value) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("expected type {ty}, got {}", type_name(value)),
            });
            return;
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("value not in enum: {value}"),
            });
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
            if n < min {
                errors.push(ValidationError {
                    path: path.to_string(),
                    message: format!("{n} is below minimum {min}"),
                });
            }
        }
        if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
            if n > max {
                errors.push(ValidationError {
                    path: path.to_string(),
                    message: format!("{n} is above maximum {max}"),
                });
            }
        }
    }

    if let Some(pattern) = schema_obj.get("pattern").and_then(Value::as_str) {
        if let Some(s) = value.as_str() {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("value does not match pattern {pattern}"),
                    });
                }
                Err(e) => errors.push(ValidationError {
                    path: path.to_string(),
                    message: format!("invalid pattern {pattern}: {e}"),
                }),
                _ => {}
            }
        }
    }

    if let Some(props) = schema_obj.get("properties").and_then(Value::as_object) {
        let Some(obj) = value.as_object() else {
            return;
        };
        let required: Vec<&str> = schema_obj
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for key in &required {
            if !obj.contains_key(*key) {
                errors.push(ValidationError {
                    path: format!("{path}.{key}"),
                    message: "missing required property".to_string(),
                });
            }
        }

        for (key, sub_schema) in props {
            if let Some(sub_value) = obj.get(key) {
                validate_node(sub_schema, sub_value, &format!("{path}.{key}"), errors);
            }
        }
    }
}

fn type_matches(ty: &str, value: &Value) -> bool {
    match ty {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true, // unknown type keyword — don't fail on it
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}
