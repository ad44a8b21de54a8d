//! Span storage trait and implementations.
//!
//! Provides the `SpanStore` trait the collector hands accepted batches to,
//! and an `InMemorySpanStore` implementation for development and testing.

use crate::models::{Span, Trace};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during span store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on span store")]
    LockError,

    /// The backend could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Generic storage error.
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Destination for span batches that passed decoding and sampling.
///
/// Implementations must be thread-safe (Send + Sync); `accept` may complete
/// on any task.
#[async_trait]
pub trait SpanStore: Send + Sync {
    /// Persists a batch of spans.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be stored.
    async fn accept(&self, spans: Vec<Span>) -> Result<(), StoreError>;
}

/// In-memory span store, spans grouped by `trace_id`.
#[derive(Debug, Default)]
pub struct InMemorySpanStore {
    spans: Arc<RwLock<HashMap<String, Vec<Span>>>>,
}

impl InMemorySpanStore {
    /// Creates a new empty in-memory span store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory span store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Gets a trace by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn get_trace(&self, trace_id: &str) -> Result<Option<Trace>, StoreError> {
        let spans = self.spans.read().map_err(|_| StoreError::LockError)?;
        Ok(spans
            .get(trace_id)
            .and_then(|s| Trace::from_spans(s.clone())))
    }

    /// Returns the total number of spans in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn span_count(&self) -> Result<usize, StoreError> {
        let spans = self.spans.read().map_err(|_| StoreError::LockError)?;
        Ok(spans.values().map(Vec::len).sum())
    }

    /// Returns the number of distinct traces in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn trace_count(&self) -> Result<usize, StoreError> {
        let spans = self.spans.read().map_err(|_| StoreError::LockError)?;
        Ok(spans.len())
    }
}

#[async_trait]
impl SpanStore for InMemorySpanStore {
    async fn accept(&self, new_spans: Vec<Span>) -> Result<(), StoreError> {
        let mut spans = self.spans.write().map_err(|_| StoreError::LockError)?;
        for span in new_spans {
            spans.entry(span.trace_id.clone()).or_default().push(span);
        }
        Ok(())
    }
}
