//! Protobuf span list codec.
//!
//! The schema, expressed in proto3:
//!
//! ```text
//! message ListOfSpans { repeated Span spans = 1; }
//!
//! message Span {
//!   bytes trace_id = 1;             // 8 or 16 bytes
//!   bytes parent_id = 2;            // 8 bytes, empty for root spans
//!   bytes id = 3;                   // 8 bytes
//!   Kind kind = 4;
//!   string name = 5;
//!   fixed64 start_time_unix_nano = 6;
//!   fixed64 end_time_unix_nano = 7;
//!   string service = 8;
//!   Status status = 9;
//!   map<string, string> tags = 10;
//!   repeated Annotation annotations = 11;
//!   bool debug = 12;
//! }
//!
//! message Annotation { fixed64 time_unix_nano = 1; string value = 2; }
//! ```

use super::CodecError;
use crate::models::{Span, SpanEvent, SpanKind, SpanStatus};
use chrono::{DateTime, Utc};
use prost::Message;
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};

/// A batch of spans.
#[derive(Clone, PartialEq, Message)]
pub struct ListOfSpans {
    /// Spans in the batch.
    #[prost(message, repeated, tag = "1")]
    pub spans: Vec<ProtoSpan>,
}

/// A single span as carried on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoSpan {
    /// Trace identifier, 8 or 16 bytes.
    #[prost(bytes = "vec", tag = "1")]
    pub trace_id: Vec<u8>,
    /// Parent span identifier, empty for root spans.
    #[prost(bytes = "vec", tag = "2")]
    pub parent_id: Vec<u8>,
    /// Span identifier, 8 bytes.
    #[prost(bytes = "vec", tag = "3")]
    pub id: Vec<u8>,
    /// Span kind.
    #[prost(enumeration = "Kind", tag = "4")]
    pub kind: i32,
    /// Operation name.
    #[prost(string, tag = "5")]
    pub name: String,
    /// Start timestamp in nanoseconds since the epoch.
    #[prost(fixed64, tag = "6")]
    pub start_time_unix_nano: u64,
    /// End timestamp in nanoseconds since the epoch.
    #[prost(fixed64, tag = "7")]
    pub end_time_unix_nano: u64,
    /// Service that recorded the span.
    #[prost(string, tag = "8")]
    pub service: String,
    /// Span status.
    #[prost(enumeration = "Status", tag = "9")]
    pub status: i32,
    /// String tags.
    #[prost(map = "string, string", tag = "10")]
    pub tags: HashMap<String, String>,
    /// Timestamped annotations.
    #[prost(message, repeated, tag = "11")]
    pub annotations: Vec<Annotation>,
    /// Forces the span past sampling.
    #[prost(bool, tag = "12")]
    pub debug: bool,
}

/// A timestamped annotation.
#[derive(Clone, PartialEq, Message)]
pub struct Annotation {
    /// Annotation timestamp in nanoseconds since the epoch.
    #[prost(fixed64, tag = "1")]
    pub time_unix_nano: u64,
    /// Annotation text.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Wire values of [`SpanKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Kind {
    /// Internal operation.
    Internal = 0,
    /// Server side of a request.
    Server = 1,
    /// Client side of a request.
    Client = 2,
    /// Message producer.
    Producer = 3,
    /// Message consumer.
    Consumer = 4,
}

/// Wire values of [`SpanStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Status {
    /// Completed without error.
    Ok = 0,
    /// Completed with an error.
    Error = 1,
    /// Cancelled.
    Cancelled = 2,
}

impl From<Kind> for SpanKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Internal => Self::Internal,
            Kind::Server => Self::Server,
            Kind::Client => Self::Client,
            Kind::Producer => Self::Producer,
            Kind::Consumer => Self::Consumer,
        }
    }
}

impl From<SpanKind> for Kind {
    fn from(kind: SpanKind) -> Self {
        match kind {
            SpanKind::Internal => Self::Internal,
            SpanKind::Server => Self::Server,
            SpanKind::Client => Self::Client,
            SpanKind::Producer => Self::Producer,
            SpanKind::Consumer => Self::Consumer,
        }
    }
}

impl From<Status> for SpanStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Self::Ok,
            Status::Error => Self::Error,
            Status::Cancelled => Self::Cancelled,
        }
    }
}

impl From<SpanStatus> for Status {
    fn from(status: SpanStatus) -> Self {
        match status {
            SpanStatus::Ok => Self::Ok,
            SpanStatus::Error => Self::Error,
            SpanStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Converts a wire timestamp (nanoseconds since epoch) to a `DateTime<Utc>`.
fn timestamp_to_datetime(nanos: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_nanos(nanos))
}

/// Converts a `DateTime<Utc>` to wire nanoseconds, clamping pre-epoch times to zero.
fn datetime_to_timestamp(time: DateTime<Utc>) -> u64 {
    time.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

/// Hex-encodes an identifier, leaving an empty field empty so validation can name it.
fn id_to_hex(id: &[u8]) -> String {
    hex::encode(id)
}

fn hex_to_id(field: &str, id: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(id).map_err(|e| CodecError::ProtoField(format!("{field} {id:?}: {e}")))
}

/// Converts a wire span into the span model.
///
/// # Errors
///
/// Returns [`CodecError::ProtoField`] if the kind or status is unknown.
pub fn proto_span_to_span(span: ProtoSpan) -> Result<Span, CodecError> {
    let kind = Kind::try_from(span.kind)
        .map_err(|_| CodecError::ProtoField(format!("unknown span kind {}", span.kind)))?;
    let status = Status::try_from(span.status)
        .map_err(|_| CodecError::ProtoField(format!("unknown span status {}", span.status)))?;

    let parent_span_id = if span.parent_id.is_empty() {
        None
    } else {
        Some(id_to_hex(&span.parent_id))
    };

    let attributes = span
        .tags
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();

    let events = span
        .annotations
        .into_iter()
        .map(|a| SpanEvent {
            name: a.value,
            timestamp: timestamp_to_datetime(a.time_unix_nano),
        })
        .collect();

    Ok(Span {
        trace_id: id_to_hex(&span.trace_id),
        span_id: id_to_hex(&span.id),
        parent_span_id,
        name: span.name,
        service: span.service,
        kind: kind.into(),
        status: status.into(),
        start_time: timestamp_to_datetime(span.start_time_unix_nano),
        end_time: timestamp_to_datetime(span.end_time_unix_nano),
        attributes,
        events,
        debug: span.debug,
    })
}

/// Converts a span model into its wire form.
///
/// Non-string attribute values are carried as their JSON text.
///
/// # Errors
///
/// Returns [`CodecError::ProtoField`] if an identifier is not hex.
pub fn span_to_proto_span(span: &Span) -> Result<ProtoSpan, CodecError> {
    let parent_id = span
        .parent_span_id
        .as_deref()
        .map(|p| hex_to_id("parentSpanId", p))
        .transpose()?
        .unwrap_or_default();

    let tags = span
        .attributes
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();

    let annotations = span
        .events
        .iter()
        .map(|e| Annotation {
            time_unix_nano: datetime_to_timestamp(e.timestamp),
            value: e.name.clone(),
        })
        .collect();

    Ok(ProtoSpan {
        trace_id: hex_to_id("traceId", &span.trace_id)?,
        parent_id,
        id: hex_to_id("spanId", &span.span_id)?,
        kind: Kind::from(span.kind).into(),
        name: span.name.clone(),
        start_time_unix_nano: datetime_to_timestamp(span.start_time),
        end_time_unix_nano: datetime_to_timestamp(span.end_time),
        service: span.service.clone(),
        status: Status::from(span.status).into(),
        tags,
        annotations,
        debug: span.debug,
    })
}

/// Decodes a protobuf `ListOfSpans`.
///
/// # Errors
///
/// Returns a [`CodecError`] if the message is malformed or a span carries an
/// unknown enum value.
pub fn decode(bytes: &[u8]) -> Result<Vec<Span>, CodecError> {
    ListOfSpans::decode(bytes)?
        .spans
        .into_iter()
        .map(proto_span_to_span)
        .collect()
}

/// Encodes spans as a protobuf `ListOfSpans`.
///
/// # Errors
///
/// Returns a [`CodecError`] if a span identifier is not hex.
pub fn encode(spans: &[Span]) -> Result<Vec<u8>, CodecError> {
    let list = ListOfSpans {
        spans: spans
            .iter()
            .map(span_to_proto_span)
            .collect::<Result<_, _>>()?,
    };
    Ok(list.encode_to_vec())
}
