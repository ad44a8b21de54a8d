//! Wire formats for span batches.
//!
//! A request body carries a list of spans in one of two formats:
//!
//! - [`SpanFormat::Json`]: a JSON array of span objects (the default)
//! - [`SpanFormat::Proto`]: a protobuf `ListOfSpans` message
//!
//! # Example
//!
//! ```
//! use shared::codec::{decode_spans, encode_spans, SpanFormat};
//! use shared::models::Span;
//!
//! let spans = vec![Span::new("463ac35c9f6413ad", "a2fb4a1d1a96d312", "get", "web")];
//! let bytes = encode_spans(SpanFormat::Proto, &spans).unwrap();
//! assert_eq!(decode_spans(SpanFormat::Proto, &bytes).unwrap().len(), 1);
//! ```

pub mod json;
pub mod proto;


use crate::models::Span;
use thiserror::Error;

/// Content type that selects the protobuf format.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Content type of the JSON format.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Wire format of a span batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpanFormat {
    /// JSON array of spans.
    #[default]
    Json,
    /// Protobuf `ListOfSpans`.
    Proto,
}

impl SpanFormat {
    /// Picks the format declared by a `Content-Type` value.
    ///
    /// Anything other than protobuf is treated as JSON.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with(CONTENT_TYPE_PROTOBUF) => Self::Proto,
            _ => Self::Json,
        }
    }

    /// Returns the content type that declares this format.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => CONTENT_TYPE_JSON,
            Self::Proto => CONTENT_TYPE_PROTOBUF,
        }
    }
}

impl std::fmt::Display for SpanFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Proto => write!(f, "proto"),
        }
    }
}

/// Errors produced while decoding or encoding span batches.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The JSON payload was malformed.
    #[error("malformed JSON span list: {0}")]
    Json(#[from] serde_json::Error),

    /// The protobuf payload was malformed.
    #[error("malformed protobuf span list: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    /// A protobuf span carried a field that does not map onto a span.
    #[error("invalid protobuf span: {0}")]
    ProtoField(String),
}

/// Decodes a span batch in the given format.
///
/// # Errors
///
/// Returns a [`CodecError`] if the bytes are not a valid span list.
pub fn decode_spans(format: SpanFormat, bytes: &[u8]) -> Result<Vec<Span>, CodecError> {
    match format {
        SpanFormat::Json => json::decode(bytes),
        SpanFormat::Proto => proto::decode(bytes),
    }
}

/// Encodes a span batch in the given format.
///
/// # Errors
///
/// Returns a [`CodecError`] if the spans cannot be represented in the format.
pub fn encode_spans(format: SpanFormat, spans: &[Span]) -> Result<Vec<u8>, CodecError> {
    match format {
        SpanFormat::Json => json::encode(spans),
        SpanFormat::Proto => proto::encode(spans),
    }
}
