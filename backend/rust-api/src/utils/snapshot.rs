use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

/// Snapshot token is not valid base64-encoded UTF-8. Callers treat this as
/// "no description" when the field is optional.
#[derive(Debug, Error)]
#[error("invalid snapshot encoding: {0}")]
pub struct DecodeError(String);

/// Consistency violations between the exercise name and description
/// snapshots. Name and description must be both present or both absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Security error: exercise name without description snapshot")]
    NameWithoutDescription,
    #[error("Security error: exercise description without name snapshot")]
    DescriptionWithoutName,
    #[error("Invalid base64 format in exercise description snapshot")]
    InvalidEncoding,
}

/// Encode an exercise description for transport to the frontend.
pub fn encode(description: &str) -> String {
    general_purpose::STANDARD.encode(description.as_bytes())
}

/// Decode a transport token back into the original description text.
pub fn decode(token: &str) -> Result<String, DecodeError> {
    let bytes = general_purpose::STANDARD
        .decode(token)
        .map_err(|e| DecodeError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DecodeError(e.to_string()))
}

/// Decode an optional description snapshot, treating any malformed token as
/// absence rather than a hard failure.
pub fn decode_optional(token: Option<&str>) -> Option<String> {
    let token = token.filter(|t| !t.is_empty())?;
    decode(token).ok()
}

/// Validate the joint presence invariant on the snapshot pair. Empty strings
/// count as absent. Both-absent is valid: it means no exercise is active.
pub fn validate(name: Option<&str>, description: Option<&str>) -> Result<(), SecurityError> {
    let name = name.filter(|n| !n.is_empty());
    let description = description.filter(|d| !d.is_empty());

    match (name, description) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(SecurityError::NameWithoutDescription),
        (None, Some(_)) => Err(SecurityError::DescriptionWithoutName),
        (Some(_), Some(desc)) => {
            if decode(desc).is_err() {
                return Err(SecurityError::InvalidEncoding);
            }
            Ok(())
        }
    }
}
