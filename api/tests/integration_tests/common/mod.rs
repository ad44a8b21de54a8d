//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup, scripted span consumers, and HTTP request helpers.

use api::{create_router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use shared::bytes::Bytes;
use shared::codec::SpanFormat;
use shared::collector::{ConsumeFailure, SpanConsumer};
use shared::models::Span;
use shared::sampler::CollectorSampler;
use shared::storage::InMemorySpanStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Creates a test router backed by a fresh in-memory store.
pub fn test_app() -> (Router, AppState, Arc<InMemorySpanStore>) {
    let store = InMemorySpanStore::new_shared();
    let state = AppState::with_store(store.clone(), CollectorSampler::ALWAYS_SAMPLE);
    (create_router(state.clone()), state, store)
}

/// Creates a test router whose uploads go to `consumer`.
pub fn app_with_consumer(consumer: Arc<dyn SpanConsumer>) -> (Router, AppState) {
    let state = AppState::new(consumer);
    (create_router(state.clone()), state)
}

/// A consumer that answers every upload with a fixed result after an optional delay.
pub struct ScriptedConsumer {
    result: Result<(), ConsumeFailure>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedConsumer {
    /// Succeeds every upload.
    pub fn succeeding() -> Arc<Self> {
        Self::with_result(Ok(()))
    }

    /// Fails every upload with `failure`.
    pub fn failing(failure: ConsumeFailure) -> Arc<Self> {
        Self::with_result(Err(failure))
    }

    fn with_result(result: Result<(), ConsumeFailure>) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    /// Delays every answer by `delay`.
    pub fn delayed(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: self.result.clone(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of uploads that reached this consumer.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpanConsumer for ScriptedConsumer {
    async fn consume(&self, _bytes: Bytes, _format: SpanFormat) -> Result<(), ConsumeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Builds a valid span for `trace_id`.
pub fn span(trace_id: &str, span_id: &str, service: &str) -> Span {
    Span::new(trace_id, span_id, "get /api", service)
}

/// Posts raw bytes to the span endpoint.
///
/// # Returns
///
/// A tuple containing the response status code and the body as text.
pub async fn post_spans(
    app: Router,
    body: impl Into<Body>,
    content_type: Option<&str>,
    content_encoding: Option<&str>,
) -> (StatusCode, String) {
    let mut request = Request::builder().method("POST").uri("/api/v1/spans");
    if let Some(content_type) = content_type {
        request = request.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(content_encoding) = content_encoding {
        request = request.header(header::CONTENT_ENCODING, content_encoding);
    }

    let response = tower::ServiceExt::oneshot(app, request.body(body.into()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}
