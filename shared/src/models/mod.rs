//! Data models for the Spanline collector.

pub mod trace;

pub use trace::{Span, SpanEvent, SpanKind, SpanStatus, SpanValidationError, Trace};
