//! JSON span list codec.

use super::CodecError;
use crate::models::Span;

/// Decodes a JSON array of spans.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload is not a JSON span array.
pub fn decode(bytes: &[u8]) -> Result<Vec<Span>, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encodes spans as a JSON array.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if an attribute cannot be serialized.
pub fn encode(spans: &[Span]) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(spans)?)
}
