//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::QuarryError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Normalize what a model sent: JSON text is parsed, `null` becomes `{}`.
    pub fn from_model(value: Value) -> Result<Self, QuarryError> {
        let value = match value {
            Value::Null => serde_json::json!({}),
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).map_err(|e| {
                        QuarryError::InvalidArgument(format!("arguments are not valid JSON: {e}"))
                    })?
                }
            }
            other => other,
        };
        Ok(Self { value })
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, QuarryError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| QuarryError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument. Empty strings count as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Get an optional non-negative integer argument.
    pub fn get_usize_opt(&self, key: &str) -> Result<Option<usize>, QuarryError> {
        match self.value.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    QuarryError::InvalidArgument(format!(
                        "{key} must be a non-negative integer, got {v}"
                    ))
                }),
        }
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, QuarryError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            QuarryError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_arguments_are_parsed() {
        let args = ToolArguments::from_model(json!(r#"{"source": "A"}"#)).unwrap();
        assert_eq!(args.get_str("source").unwrap(), "A");
        assert!(ToolArguments::from_model(json!("{not json")).is_err());
        assert_eq!(ToolArguments::from_model(Value::Null).unwrap().raw(), &json!({}));
    }

    #[test]
    fn optional_helpers() {
        let args = ToolArguments::new(json!({"n": 3, "source": "", "bad": -1}));
        assert_eq!(args.get_usize_opt("n").unwrap(), Some(3));
        assert_eq!(args.get_usize_opt("missing").unwrap(), None);
        assert!(args.get_usize_opt("bad").is_err());
        assert_eq!(args.get_str_opt("source"), None);
    }
}
