/// Input validation functions for all backend routes
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Cosmetic id cannot be empty")]
    CosmeticIdEmpty,

    #[error("Cosmetic id contains invalid characters (only a-z, 0-9, '_', '-' and '.' allowed)")]
    CosmeticIdInvalidChars,

    #[error("Cosmetic id must be a string")]
    CosmeticIdNotString,

    #[error("Cosmetic version is required")]
    VersionMissing,

    #[error("Cosmetic version must be a positive integer")]
    VersionInvalid,

    #[error("Request body must be a JSON object")]
    BodyNotJsonObject,

    #[error("Invalid json!")]
    CustomDataInvalid,
}

/// True iff every character is one of `[a-z0-9_.-]`.
///
/// The empty string passes; callers that need a non-empty id check that
/// separately (see [`validate_cosmetic_id`]).
pub fn is_valid_namespace(s: &str) -> bool {
    s.chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
}

/// True iff `s` is literally `{...}` and parses as JSON.
/// No surrounding whitespace is tolerated.
pub fn is_json_object(s: &str) -> bool {
    if !(s.starts_with('{') && s.ends_with('}')) {
        return false;
    }
    serde_json::from_str::<Map<String, Value>>(s).is_ok()
}

/// Validates a cosmetic id
///
/// Rules:
/// - Cannot be empty
/// - Only lowercase alphanumerics and `_`, `-`, `.`
pub fn validate_cosmetic_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::CosmeticIdEmpty);
    }

    if !is_valid_namespace(id) {
        return Err(ValidationError::CosmeticIdInvalidChars);
    }

    Ok(())
}

/// Validates the `version` field of a cosmetic document and returns it.
///
/// Integral floats such as `2.0` are accepted.
pub fn validate_version(version: Option<&Value>) -> Result<i64, ValidationError> {
    let number = match version {
        None | Some(Value::Null) => return Err(ValidationError::VersionMissing),
        Some(Value::Number(n)) => n,
        Some(_) => return Err(ValidationError::VersionInvalid),
    };

    let version = match number.as_i64() {
        Some(v) => v,
        None => match number.as_f64() {
            Some(f) if f.fract() == 0.0 && (1.0..=i64::MAX as f64).contains(&f) => f as i64,
            _ => return Err(ValidationError::VersionInvalid),
        },
    };

    if version < 1 {
        return Err(ValidationError::VersionInvalid);
    }

    Ok(version)
}

/// Parses a request body into a JSON object.
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    serde_json::from_slice(body).map_err(|_| ValidationError::BodyNotJsonObject)
}

/// Validates player custom data (must be a JSON object)
pub fn validate_custom_data(data: &str) -> Result<(), ValidationError> {
    if !is_json_object(data) {
        return Err(ValidationError::CustomDataInvalid);
    }
    Ok(())
}
