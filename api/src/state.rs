//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::collector::{Collector, InMemoryCollectorMetrics, SpanConsumer};
use shared::ingest::IngestPipeline;
use shared::sampler::CollectorSampler;
use shared::storage::{InMemorySpanStore, SpanStore};
use std::sync::Arc;

/// Transport label for counters recorded by this server.
const TRANSPORT: &str = "http";

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The pipeline every span upload goes through.
    pipeline: IngestPipeline,
    /// Counters for the HTTP transport.
    metrics: Arc<InMemoryCollectorMetrics>,
}

impl AppState {
    /// Creates state that feeds uploads to `consumer`.
    pub fn new(consumer: Arc<dyn SpanConsumer>) -> Self {
        let metrics = Arc::new(InMemoryCollectorMetrics::for_transport(TRANSPORT));
        let pipeline = IngestPipeline::new(consumer, metrics.clone());
        Self { pipeline, metrics }
    }

    /// Creates state whose collector samples with `sampler` and writes to `store`.
    pub fn with_store(store: Arc<dyn SpanStore>, sampler: CollectorSampler) -> Self {
        let metrics = Arc::new(InMemoryCollectorMetrics::for_transport(TRANSPORT));
        let collector = Collector::new(store, metrics.clone()).with_sampler(sampler);
        let pipeline = IngestPipeline::new(Arc::new(collector), metrics.clone());
        Self { pipeline, metrics }
    }

    /// Creates state backed by a fresh in-memory store that keeps every trace.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store() -> Self {
        Self::with_store(InMemorySpanStore::new_shared(), CollectorSampler::ALWAYS_SAMPLE)
    }

    /// Returns the ingest pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Returns the transport counters.
    #[must_use]
    pub fn metrics(&self) -> &InMemoryCollectorMetrics {
        self.metrics.as_ref()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::codec::SpanFormat;
    use shared::ingest::{IngestRequest, Outcome};

    #[tokio::test]
    async fn test_app_state_with_store() {
        let store = InMemorySpanStore::new_shared();
        let state = AppState::with_store(store.clone(), CollectorSampler::ALWAYS_SAMPLE);
        let body = r#"[{"traceId":"0000000000000001","spanId":"000000000000000a","name":"op","service":"svc","startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-01T00:00:00Z"}]"#;

        let outcome = state
            .pipeline()
            .accept_spans(IngestRequest::new(None, SpanFormat::Json, body.into()))
            .await;

        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(store.span_count().unwrap(), 1);
        assert_eq!(state.metrics().snapshot().messages, 1);
        assert_eq!(state.metrics().transport(), "http");
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::with_in_memory_store();
        let state2 = state.clone();

        // Both share the same counters.
        shared::collector::CollectorMetrics::increment_messages(state.metrics());

        assert_eq!(state2.metrics().snapshot().messages, 1);
    }
}
