use serde_json::Value;

use super::Identity;
use crate::error::ModelError;

/// Longest accepted string identity, in characters.
pub const MAX_IDENTITY_LEN: usize = 256;

/// Validate a raw JSON identity and convert it into an [`Identity`].
///
/// Strings must be non-empty, free of control characters, carry no leading or
/// trailing whitespace, and stay within [`MAX_IDENTITY_LEN`]. Integers are
/// accepted as-is.
pub fn identity(raw: &Value, field: &str) -> Result<Identity, ModelError> {
    match raw {
        Value::String(text) => identity_str(text, field),
        Value::Number(number) => number.as_i64().map(Identity::Int).ok_or_else(|| {
            validation(field, format!("must be an integer or a string, got {}", number))
        }),
        other => Err(validation(
            field,
            format!("must be an integer or a string, got {}", other),
        )),
    }
}

/// Validate a textual identity.
pub fn identity_str(text: &str, field: &str) -> Result<Identity, ModelError> {
    if text.is_empty() {
        return Err(validation(field, "must not be empty"));
    }
    if text.chars().count() > MAX_IDENTITY_LEN {
        return Err(validation(
            field,
            format!("must be at most {} characters", MAX_IDENTITY_LEN),
        ));
    }
    if text.chars().any(char::is_control) {
        return Err(validation(field, "must not contain control characters"));
    }
    if text.trim() != text {
        return Err(validation(
            field,
            "must not start or end with whitespace",
        ));
    }
    Ok(Identity::Str(text.to_string()))
}

/// Validate a property key.
pub fn property_key(key: &str) -> Result<(), ModelError> {
    if key.is_empty() {
        return Err(validation("property key", "must not be empty"));
    }
    Ok(())
}

fn validation(field: &str, reason: impl Into<String>) -> ModelError {
    ModelError::Validation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_strings_and_integers() {
        assert_eq!(identity(&json!("a"), "id").unwrap(), Identity::from("a"));
        assert_eq!(identity(&json!(12), "id").unwrap(), Identity::Int(12));
    }

    #[test]
    fn rejects_malformed_identities() {
        for raw in [json!(""), json!(" a"), json!("a\nb"), json!(1.5), json!([1]), json!(null)] {
            let err = identity(&raw, "data.id").unwrap_err();
            assert!(matches!(err, ModelError::Validation { .. }), "{raw}");
        }
    }
}
