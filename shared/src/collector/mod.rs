//! Span collection: decode, validate, sample, store.
//!
//! [`Collector`] is the default [`SpanConsumer`]. It turns a payload into
//! spans, drops the ones the sampler does not keep, and hands the rest to a
//! [`SpanStore`]. Failures carry both a message and a [`FailureKind`] so the
//! ingest pipeline can map them to a response status.

pub mod metrics;

pub use metrics::{CollectorMetrics, InMemoryCollectorMetrics, MetricsSnapshot};

use crate::codec::{decode_spans, CodecError, SpanFormat};
use crate::models::SpanValidationError;
use crate::sampler::CollectorSampler;
use crate::storage::{SpanStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Who is responsible for a failed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The payload was unreadable or its spans were invalid.
    Validation,
    /// The collector or its storage could not complete the write.
    Infrastructure,
}

impl FailureKind {
    /// Name used in place of a message when a failure carries none.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Validation => "ValidationFailure",
            Self::Infrastructure => "InfrastructureFailure",
        }
    }
}

/// Errors raised by [`Collector`].
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The payload could not be decoded.
    #[error("Cannot decode spans: {0}")]
    Decode(#[from] CodecError),

    /// A decoded span failed validation.
    #[error("{0}")]
    Invalid(#[from] SpanValidationError),

    /// The store rejected the batch.
    #[error("Cannot store spans: {0}")]
    Store(#[from] StoreError),
}

impl CollectorError {
    /// Returns who is responsible for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Decode(_) | Self::Invalid(_) => FailureKind::Validation,
            Self::Store(_) => FailureKind::Infrastructure,
        }
    }
}

/// Failure reported by a [`SpanConsumer`].
///
/// Both parts are optional: consumers that only know a message leave the
/// kind unset, and the message may be absent entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeFailure {
    message: Option<String>,
    kind: Option<FailureKind>,
}

impl ConsumeFailure {
    /// Creates a failure with a message and no kind.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            kind: None,
        }
    }

    /// Creates a failure with neither message nor kind.
    #[must_use]
    pub fn without_message() -> Self {
        Self::default()
    }

    /// Sets the failure kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the failure kind, if any.
    #[must_use]
    pub fn kind(&self) -> Option<FailureKind> {
        self.kind
    }
}

impl From<CollectorError> for ConsumeFailure {
    fn from(err: CollectorError) -> Self {
        Self::new(err.to_string()).with_kind(err.kind())
    }
}

/// The decode, sample, and store step behind the ingest pipeline.
#[async_trait]
pub trait SpanConsumer: Send + Sync {
    /// Consumes a (decompressed) payload in the given format.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsumeFailure`] if the payload was not stored.
    async fn consume(&self, bytes: Bytes, format: SpanFormat) -> Result<(), ConsumeFailure>;
}

/// Decodes payloads, validates and samples spans, and stores the survivors.
#[derive(Clone)]
pub struct Collector {
    store: Arc<dyn SpanStore>,
    sampler: CollectorSampler,
    metrics: Arc<dyn CollectorMetrics>,
}

impl Collector {
    /// Creates a collector that keeps every trace.
    pub fn new(store: Arc<dyn SpanStore>, metrics: Arc<dyn CollectorMetrics>) -> Self {
        Self {
            store,
            sampler: CollectorSampler::ALWAYS_SAMPLE,
            metrics,
        }
    }

    /// Sets the sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: CollectorSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Decodes, validates, samples, and stores a payload.
    ///
    /// Returns the number of spans handed to the store. An empty batch, or
    /// one the sampler drops entirely, succeeds without touching the store.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectorError`] if decoding, validation, or storage fails.
    pub async fn accept_spans(
        &self,
        bytes: &[u8],
        format: SpanFormat,
    ) -> Result<usize, CollectorError> {
        self.metrics.increment_bytes(bytes.len());

        let spans = decode_spans(format, bytes)?;
        if spans.is_empty() {
            return Ok(0);
        }
        self.metrics.increment_spans(spans.len());

        if let Err(e) = spans.iter().try_for_each(|s| s.validate_span()) {
            self.metrics.increment_spans_dropped(spans.len());
            return Err(e.into());
        }

        let decoded = spans.len();
        let sampled: Vec<_> = spans
            .into_iter()
            .filter(|s| self.sampler.is_sampled(s))
            .collect();
        let dropped = decoded - sampled.len();
        if dropped > 0 {
            self.metrics.increment_spans_dropped(dropped);
            tracing::debug!(dropped, %format, "Sampler dropped spans");
        }
        if sampled.is_empty() {
            return Ok(0);
        }

        let stored = sampled.len();
        if let Err(e) = self.store.accept(sampled).await {
            self.metrics.increment_spans_dropped(stored);
            return Err(e.into());
        }

        tracing::debug!(spans = stored, %format, "Stored spans");
        Ok(stored)
    }
}

#[async_trait]
impl SpanConsumer for Collector {
    async fn consume(&self, bytes: Bytes, format: SpanFormat) -> Result<(), ConsumeFailure> {
        self.accept_spans(&bytes, format)
            .await
            .map(|_| ())
            .map_err(ConsumeFailure::from)
    }
}
