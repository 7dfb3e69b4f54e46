//! Local payload validation.
//!
//! Runs before anything is sent to the engine; a payload that fails here
//! never produces a remote call.

use crate::error::{Error, Result};

/// Shape checks applied to workflow input payloads.
#[derive(Debug, Clone)]
pub struct PayloadValidator {
    max_bytes: usize,
    required_fields: Vec<String>,
}

impl PayloadValidator {
    /// Create a validator with a size limit and required top-level fields.
    pub fn new(max_bytes: usize, required_fields: Vec<String>) -> Self {
        Self {
            max_bytes,
            required_fields,
        }
    }

    /// Validate a payload.
    pub fn validate(&self, payload: &serde_json::Value) -> Result<()> {
        let object = payload.as_object().ok_or_else(|| {
            Error::InvalidPayload(format!(
                "payload must be a JSON object, got {}",
                json_type(payload)
            ))
        })?;

        for field in &self.required_fields {
            match object.get(field) {
                None | Some(serde_json::Value::Null) => {
                    return Err(Error::InvalidPayload(format!(
                        "missing required field '{}'",
                        field
                    )));
                }
                Some(_) => {}
            }
        }

        let size = serde_json::to_vec(payload)?.len();
        if size > self.max_bytes {
            return Err(Error::InvalidPayload(format!(
                "payload is {} bytes, limit is {}",
                size, self.max_bytes
            )));
        }

        Ok(())
    }

    /// Parse raw payload text. Shape checks are left to [`Self::validate`],
    /// which runs when the payload is launched.
    pub fn parse(raw: &str) -> Result<serde_json::Value> {
        serde_json::from_str(raw)
            .map_err(|e| Error::InvalidPayload(format!("payload is not valid JSON: {}", e)))
    }
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new(256 * 1024, Vec::new())
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_object() {
        let validator = PayloadValidator::new(1024, vec!["id".to_string()]);
        assert!(validator.validate(&json!({"id": "item-42"})).is_ok());
    }

    #[test]
    fn test_rejects_non_object() {
        let validator = PayloadValidator::default();
        let err = validator.validate(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_rejects_missing_or_null_field() {
        let validator = PayloadValidator::new(1024, vec!["id".to_string()]);
        assert!(validator.validate(&json!({"other": 1})).is_err());
        assert!(validator.validate(&json!({"id": null})).is_err());
    }

    #[test]
    fn test_rejects_oversized() {
        let validator = PayloadValidator::new(16, Vec::new());
        let err = validator
            .validate(&json!({"data": "this is definitely too long"}))
            .unwrap_err();
        assert!(err.to_string().contains("limit is 16"));
    }

    #[test]
    fn test_parse() {
        assert_eq!(PayloadValidator::parse("{\"a\": 1}").unwrap(), json!({"a": 1}));
        assert_eq!(PayloadValidator::parse("[1]").unwrap(), json!([1]));
        assert!(matches!(
            PayloadValidator::parse("{broken").unwrap_err(),
            Error::InvalidPayload(_)
        ));
    }
}
