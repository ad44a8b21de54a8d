//! Trace and span data models.
//!
//! Defines the span record accepted by the collector and the trace view the
//! span store assembles from it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Status code for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The span completed without error.
    #[default]
    Ok,
    /// The span encountered an error.
    Error,
    /// The span was cancelled.
    Cancelled,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Kind of span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Default span kind (internal operation).
    #[default]
    Internal,
    /// The span represents a server handling a request.
    Server,
    /// The span represents a client making a request.
    Client,
    /// The span represents a producer sending a message.
    Producer,
    /// The span represents a consumer receiving a message.
    Consumer,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// A timestamped annotation recorded during a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    /// The name of the event.
    pub name: String,
    /// Timestamp when the event occurred.
    pub timestamp: DateTime<Utc>,
}

/// A span representing a unit of work in a distributed trace.
///
/// Identifiers are lowercase hex: 16 or 32 characters for trace IDs and
/// 16 characters for span IDs.
///
/// # Example
///
/// ```
/// use shared::models::{Span, SpanKind};
///
/// let span = Span::new("463ac35c9f6413ad", "a2fb4a1d1a96d312", "get /api/users", "frontend")
///     .with_kind(SpanKind::Server)
///     .with_attribute("http.method", "GET");
///
/// assert!(span.validate_span().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Identifier of the trace this span belongs to.
    #[serde(default)]
    #[validate(length(max = 32))]
    pub trace_id: String,

    /// Identifier of this span.
    #[serde(default)]
    #[validate(length(max = 16))]
    pub span_id: String,

    /// The parent span ID (None for root spans).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    /// The operation name of this span.
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub name: String,

    /// The service that recorded this span.
    #[serde(default)]
    #[validate(length(max = 256))]
    pub service: String,

    /// The kind of span.
    #[serde(default)]
    pub kind: SpanKind,

    /// The status of the span.
    #[serde(default)]
    pub status: SpanStatus,

    /// Timestamp when the span started.
    pub start_time: DateTime<Utc>,

    /// Timestamp when the span ended.
    pub end_time: DateTime<Utc>,

    /// Tags recorded on the span.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Annotations recorded during the span.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,

    /// Debug spans bypass collector sampling.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
}

/// Errors that can occur during span validation.
#[derive(Debug, Error)]
pub enum SpanValidationError {
    /// A required field is absent or empty.
    #[error("span missing required field {0}")]
    MissingField(&'static str),

    /// An identifier is not lowercase hex of an accepted length.
    #[error("span {field} is not lowercase hex of length {expected}: {value}")]
    MalformedId {
        /// Name of the offending field.
        field: &'static str,
        /// Accepted lengths, for the message.
        expected: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The end time is before the start time.
    #[error("span {span_id} ends before it starts")]
    InvalidTimeRange {
        /// The span that failed the check.
        span_id: String,
    },

    /// Validation failed with details.
    #[error("span validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

fn is_lower_hex(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl Span {
    /// Creates a new span with the current time as both start and end.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        name: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            name: name.into(),
            service: service.into(),
            kind: SpanKind::default(),
            status: SpanStatus::default(),
            start_time: now,
            end_time: now,
            attributes: HashMap::new(),
            events: Vec::new(),
            debug: false,
        }
    }

    /// Sets the parent span ID.
    #[must_use]
    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    /// Sets the span kind.
    #[must_use]
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the span status.
    #[must_use]
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = end_time;
        self
    }

    /// Adds an attribute to the span.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Adds an event to the span.
    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        self.events.push(SpanEvent {
            name: name.into(),
            timestamp,
        });
        self
    }

    /// Marks the span as debug, forcing it past sampling.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Returns the duration of the span.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Returns the low 64 bits of the trace ID as a signed integer.
    ///
    /// Returns `None` when the trace ID is not valid hex.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn trace_id_low64(&self) -> Option<i64> {
        let start = self.trace_id.len().saturating_sub(16);
        let low = self.trace_id.get(start..)?;
        u64::from_str_radix(low, 16).ok().map(|v| v as i64)
    }

    /// Validates the span.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The trace ID, span ID, name or service is empty
    /// - An identifier is not lowercase hex of an accepted length
    /// - The end time is before the start time
    pub fn validate_span(&self) -> Result<(), SpanValidationError> {
        if self.trace_id.is_empty() {
            return Err(SpanValidationError::MissingField("traceId"));
        }
        if self.span_id.is_empty() {
            return Err(SpanValidationError::MissingField("spanId"));
        }
        if self.name.is_empty() {
            return Err(SpanValidationError::MissingField("name"));
        }
        if self.service.is_empty() {
            return Err(SpanValidationError::MissingField("service"));
        }
        if !matches!(self.trace_id.len(), 16 | 32) || !is_lower_hex(&self.trace_id) {
            return Err(SpanValidationError::MalformedId {
                field: "traceId",
                expected: "16 or 32",
                value: self.trace_id.clone(),
            });
        }
        for (field, value) in [
            ("spanId", Some(&self.span_id)),
            ("parentSpanId", self.parent_span_id.as_ref()),
        ] {
            if let Some(value) = value {
                if value.len() != 16 || !is_lower_hex(value) {
                    return Err(SpanValidationError::MalformedId {
                        field,
                        expected: "16",
                        value: value.clone(),
                    });
                }
            }
        }
        if self.end_time < self.start_time {
            return Err(SpanValidationError::InvalidTimeRange {
                span_id: self.span_id.clone(),
            });
        }
        self.validate()?;
        Ok(())
    }
}

/// A trace consisting of multiple spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// The trace ID.
    pub trace_id: String,

    /// All spans in this trace.
    pub spans: Vec<Span>,

    #[serde(skip)]
    root_span_index: Option<usize>,
}

impl Trace {
    /// Creates a new trace from a collection of spans.
    #[must_use]
    pub fn from_spans(spans: Vec<Span>) -> Option<Self> {
        let trace_id = spans.first()?.trace_id.clone();
        let root_span_index = spans.iter().position(Span::is_root);

        Some(Self {
            trace_id,
            spans,
            root_span_index,
        })
    }

    /// Returns the root span if it exists.
    #[must_use]
    pub fn root_span(&self) -> Option<&Span> {
        self.root_span_index.map(|i| &self.spans[i])
    }

    /// Returns the number of spans in this trace.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Returns all services involved in this trace.
    #[must_use]
    pub fn services(&self) -> Vec<&str> {
        let mut services: Vec<&str> = self.spans.iter().map(|s| s.service.as_str()).collect();
        services.sort_unstable();
        services.dedup();
        services
    }
}
