//! Validate tool call arguments against JSON Schema before execution.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Covers the subset of JSON Schema the built-in tools declare: `type`
/// (single or list), `required`, `properties`, `items`, `enum`, and
/// `minimum`/`maximum`. Returns `Err(message)` describing the first violation
/// found, with a dotted path to the offending field.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    validate_at("arguments", args, schema)
}

fn validate_at(path: &str, value: &Value, schema: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(single) => vec![single.as_str()],
            Value::Array(many) => many.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| value_matches_type(value, t)) {
            return Err(format!(
                "{path}: expected {}, got {}",
                allowed.join(" or "),
                json_type_name(value)
            ));
        }
    }

    if let Some(options) = schema.get("enum").and_then(Value::as_array) {
        if !options.contains(value) {
            let listed: Vec<String> = options.iter().map(Value::to_string).collect();
            return Err(format!("{path}: must be one of {}", listed.join(", ")));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if number < min {
                return Err(format!("{path}: must be >= {min}"));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if number > max {
                return Err(format!("{path}: must be <= {max}"));
            }
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(name) {
                    return Err(format!("{path}: missing required field '{name}'"));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, field) in obj {
                if let Some(field_schema) = properties.get(key) {
                    validate_at(&format!("{path}.{key}"), field, field_schema)?;
                }
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (index, item) in array.iter().enumerate() {
            validate_at(&format!("{path}[{index}]"), item, items)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": ["line", "bar", "pie"] },
                "data": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "value": { "type": ["number", "null"] }
                        },
                        "required": ["name", "value"]
                    }
                }
            },
            "required": ["type", "data"]
        })
    }

    #[test]
    fn rejects_non_object_args_when_schema_expects_object() {
        let schema = json!({ "type": "object", "properties": {}, "required": [] });
        let err = validate_arguments(&json!("not an object"), &schema).unwrap_err();
        assert!(err.contains("expected object"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
        });
        let err = validate_arguments(&json!({}), &schema).unwrap_err();
        assert!(err.contains("missing required field 'query'"));
    }

    #[test]
    fn rejects_value_outside_enum() {
        let err = validate_arguments(&json!({ "type": "scatter", "data": [] }), &chart_schema())
            .unwrap_err();
        assert!(err.contains("arguments.type"));
        assert!(err.contains("\"bar\""));
    }

    #[test]
    fn checks_array_items_with_index_in_path() {
        let args = json!({
            "type": "bar",
            "data": [{ "name": "a", "value": 1 }, { "name": "b", "value": "two" }]
        });
        let err = validate_arguments(&args, &chart_schema()).unwrap_err();
        assert!(err.starts_with("arguments.data[1].value"), "{err}");
    }

    #[test]
    fn accepts_nullable_values_and_extra_fields() {
        let args = json!({
            "type": "line",
            "data": [{ "name": "a", "value": null }],
            "extra": true
        });
        assert!(validate_arguments(&args, &chart_schema()).is_ok());
    }

    #[test]
    fn enforces_numeric_bounds() {
        let schema = json!({
            "type": "object",
            "properties": { "latitude": { "type": "number", "minimum": -90, "maximum": 90 } },
        });
        assert!(validate_arguments(&json!({ "latitude": 48.85 }), &schema).is_ok());
        assert!(validate_arguments(&json!({ "latitude": 123.0 }), &schema).is_err());
    }

    #[test]
    fn accepts_anything_when_schema_is_empty() {
        assert!(validate_arguments(&json!({ "anything": 42 }), &json!({})).is_ok());
        assert!(validate_arguments(&Value::Null, &json!({})).is_ok());
    }
}
