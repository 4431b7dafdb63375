//! Validate tool call arguments against JSON Schema before execution.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Performs top-level validation: schema type check, required field presence,
/// property types, enum membership and rejection of unknown fields when the
/// schema forbids them. Returns `Err(message)` describing the first violation.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) {
        if schema_type == "object" && !args.is_object() {
            return Err(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            ));
        }
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !obj.contains_key(field) {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    let properties = schema.get("properties").and_then(|v| v.as_object());
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in obj {
        let Some(prop_schema) = properties.and_then(|p| p.get(key)) else {
            if closed {
                return Err(format!("unknown field '{key}'"));
            }
            continue;
        };
        if let Some(expected_type) = prop_schema.get("type").and_then(|v| v.as_str()) {
            if !value_matches_type(value, expected_type) {
                return Err(format!(
                    "field '{key}' expected type '{expected_type}', got {}",
                    json_type_name(value)
                ));
            }
        }
        if let Some(allowed) = prop_schema.get("enum").and_then(|v| v.as_array()) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                return Err(format!(
                    "field '{key}' must be one of {}, got {value}",
                    options.join(", ")
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

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
