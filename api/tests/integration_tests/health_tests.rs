//! Tests for the health endpoint after traffic.

use super::common::{post_spans, test_app};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;

#[tokio::test]
async fn test_health_reports_collector_counters() {
    let (app, _state, _store) = test_app();

    let (status, _) = post_spans(app.clone(), &b"\x1f\x8b garbage"[..], None, Some("gzip")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_spans(app.clone(), "[]", None, None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["collector"]["messages"], 2);
    assert_eq!(health["collector"]["messages_dropped"], 1);
    assert_eq!(health["collector"]["bytes"], 2);
}
