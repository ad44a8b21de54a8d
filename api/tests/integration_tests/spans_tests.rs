//! End-to-end tests for `POST /api/v1/spans`.

use super::common::{app_with_consumer, post_spans, span, test_app, ScriptedConsumer};
use api::{create_router, AppState};
use async_trait::async_trait;
use axum::http::StatusCode;
use shared::codec::{encode_spans, SpanFormat};
use shared::collector::{ConsumeFailure, FailureKind};
use shared::compression::gzip;
use shared::models::Span;
use shared::sampler::CollectorSampler;
use shared::storage::{InMemorySpanStore, SpanStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

const PROTOBUF: &str = "application/x-protobuf";

struct UnavailableStore;

#[async_trait]
impl SpanStore for UnavailableStore {
    async fn accept(&self, _spans: Vec<Span>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_json_upload_is_stored() {
    let (app, state, store) = test_app();
    let body = encode_spans(
        SpanFormat::Json,
        &[
            span("463ac35c9f6413ad", "a2fb4a1d1a96d312", "frontend"),
            span("463ac35c9f6413ad", "b7ad6b7169203331", "backend")
                .with_parent("a2fb4a1d1a96d312"),
        ],
    )
    .unwrap();

    let (status, text) = post_spans(app, body, Some("application/json"), None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(text.is_empty());
    let trace = store.get_trace("463ac35c9f6413ad").unwrap().unwrap();
    assert_eq!(trace.span_count(), 2);
    assert_eq!(state.metrics().snapshot().messages, 1);
    assert_eq!(state.metrics().snapshot().messages_dropped, 0);
}

#[tokio::test]
async fn test_gzipped_protobuf_upload_is_stored() {
    let (app, state, store) = test_app();
    let payload = encode_spans(
        SpanFormat::Proto,
        &[span("48485a3953bb6124", "48485a3953bb6124", "frontend")],
    )
    .unwrap();
    let compressed = gzip(&payload).unwrap();

    let (status, text) = post_spans(app, compressed, Some(PROTOBUF), Some("gzip")).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(text.is_empty());
    assert_eq!(store.span_count().unwrap(), 1);
    let snapshot = state.metrics().snapshot();
    assert_eq!(snapshot.messages, 1);
    assert_eq!(snapshot.bytes, payload.len() as u64);
}

#[tokio::test]
async fn test_encoding_header_matches_by_containment() {
    let (app, _state, store) = test_app();
    let payload = encode_spans(
        SpanFormat::Json,
        &[span("0000000000000001", "000000000000000a", "svc")],
    )
    .unwrap();

    let (status, _) = post_spans(
        app,
        gzip(&payload).unwrap(),
        None,
        Some("x-gzip, identity"),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(store.span_count().unwrap(), 1);
}

#[tokio::test]
async fn test_corrupt_gzip_is_client_error() {
    let consumer = ScriptedConsumer::succeeding();
    let (app, state) = app_with_consumer(consumer.clone());

    let (status, text) = post_spans(app, &b"not gzip at all"[..], None, Some("gzip")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.starts_with("Cannot gunzip spans: "));
    assert!(text.ends_with('\n'));
    assert_eq!(consumer.calls(), 0);
    let snapshot = state.metrics().snapshot();
    assert_eq!(snapshot.messages, 1);
    assert_eq!(snapshot.messages_dropped, 1);
}

#[tokio::test]
async fn test_store_failure_is_server_error() {
    let state = AppState::with_store(Arc::new(UnavailableStore), CollectorSampler::ALWAYS_SAMPLE);
    let app = create_router(state.clone());
    let body = encode_spans(
        SpanFormat::Json,
        &[span("0000000000000001", "000000000000000a", "svc")],
    )
    .unwrap();

    let (status, text) = post_spans(app, body, None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        text,
        "Cannot store spans: Storage unavailable: connection refused\n"
    );
    let snapshot = state.metrics().snapshot();
    assert_eq!(snapshot.messages_dropped, 0);
    assert_eq!(snapshot.spans_dropped, 1);
}

#[tokio::test]
async fn test_missing_trace_id_is_client_error() {
    let (app, _state, store) = test_app();
    let body = r#"[{"spanId":"a2fb4a1d1a96d312","name":"get","service":"web","startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-01T00:00:01Z"}]"#;

    let (status, text) = post_spans(app, body, None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "span missing required field traceId\n");
    assert_eq!(store.span_count().unwrap(), 0);
}

#[tokio::test]
async fn test_empty_batch_is_accepted() {
    let (app, _state, store) = test_app();

    let (status, text) = post_spans(app, "[]", None, None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(text.is_empty());
    assert_eq!(store.span_count().unwrap(), 0);
}

#[tokio::test]
async fn test_message_prefix_decides_status_without_kind() {
    let (app, _) = app_with_consumer(ScriptedConsumer::failing(ConsumeFailure::new(
        "Cannot store spans: timeout",
    )));
    let (status, text) = post_spans(app, "[]", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Cannot store spans: timeout\n");

    let (app, _) = app_with_consumer(ScriptedConsumer::failing(ConsumeFailure::new(
        "Cannot decode spans",
    )));
    let (status, text) = post_spans(app, "[]", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Cannot decode spans\n");
}

#[tokio::test]
async fn test_failure_kind_overrides_message_prefix() {
    let failure = ConsumeFailure::new("Cannot store this span: id collision")
        .with_kind(FailureKind::Validation);
    let (app, _) = app_with_consumer(ScriptedConsumer::failing(failure));

    let (status, _) = post_spans(app, "[]", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failure_without_message_is_server_error() {
    let (app, _) = app_with_consumer(ScriptedConsumer::failing(
        ConsumeFailure::without_message(),
    ));

    let (status, text) = post_spans(app, "[]", None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "UnknownFailure\n");
}

#[tokio::test]
async fn test_response_waits_for_slow_consumer() {
    let consumer = ScriptedConsumer::succeeding().delayed(Duration::from_millis(50));
    let (app, _) = app_with_consumer(consumer.clone());

    let (status, _) = post_spans(app, "[]", None, None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(consumer.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_uploads_resolve_independently() {
    let store = InMemorySpanStore::new_shared();
    let good = AppState::with_store(store.clone(), CollectorSampler::ALWAYS_SAMPLE);
    let bad = AppState::with_store(Arc::new(UnavailableStore), CollectorSampler::ALWAYS_SAMPLE);

    let mut uploads = Vec::new();
    for i in 1..=8u64 {
        let state = if i % 2 == 0 { bad.clone() } else { good.clone() };
        let body = encode_spans(
            SpanFormat::Json,
            &[span(&format!("{i:016x}"), "000000000000000a", "svc")],
        )
        .unwrap();
        uploads.push(tokio::spawn(async move {
            (i, post_spans(create_router(state), body, None, None).await)
        }));
    }

    for upload in uploads {
        let (i, (status, _)) = upload.await.unwrap();
        if i % 2 == 0 {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        } else {
            assert_eq!(status, StatusCode::ACCEPTED);
        }
    }
    assert_eq!(store.trace_count().unwrap(), 4);
    assert_eq!(good.metrics().snapshot().messages, 4);
    assert_eq!(bad.metrics().snapshot().messages, 4);
}

#[tokio::test]
async fn test_sampler_drops_unsampled_traces() {
    let store = InMemorySpanStore::new_shared();
    let state = AppState::with_store(store.clone(), CollectorSampler::create(0.0).unwrap());
    let body = encode_spans(
        SpanFormat::Json,
        &[
            span("7fffffffffffffff", "000000000000000a", "svc"),
            span("7ffffffffffffffe", "000000000000000b", "svc").with_debug(true),
        ],
    )
    .unwrap();

    let (status, _) = post_spans(create_router(state.clone()), body, None, None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(store.span_count().unwrap(), 1);
    assert!(store.get_trace("7ffffffffffffffe").unwrap().is_some());
    assert_eq!(state.metrics().snapshot().spans_dropped, 1);
}
