//! Typed access to tool call arguments.

use crate::error::LuminaryError;

/// Wrapper around tool call arguments providing typed extraction.
///
/// Arguments reach a tool only after schema validation, so the getters
/// mostly guard against schema drift between declaration and handler.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    tool_name: String,
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(tool_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            value,
        }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    fn invalid(&self, message: String) -> LuminaryError {
        LuminaryError::InvalidToolArguments {
            tool_name: self.tool_name.clone(),
            message,
        }
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, LuminaryError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, LuminaryError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.invalid(format!("Missing number argument: {key}")))
    }

    /// Get an array argument.
    pub fn get_array(&self, key: &str) -> Result<&Vec<serde_json::Value>, LuminaryError> {
        self.value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| self.invalid(format!("Missing array argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    ///
    /// String-encoded JSON (as some providers send) is decoded first; an empty
    /// string is treated as `{}`.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, LuminaryError> {
        let value = match &self.value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
                        self.invalid(format!("Failed to deserialize arguments: {e}"))
                    })?
                }
            }
            other => other.clone(),
        };
        serde_json::from_value(value)
            .map_err(|e| self.invalid(format!("Failed to deserialize arguments: {e}")))
    }
}
