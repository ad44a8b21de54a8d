//! Span upload endpoint.
//!
//! `POST /api/v1/spans` accepts a span list as JSON (default) or protobuf
//! (`Content-Type: application/x-protobuf`), optionally gzip-compressed
//! (`Content-Encoding: gzip`). Responses:
//!
//! - `202 Accepted` with an empty body once the spans are stored
//! - `400 Bad Request` with `"<message>\n"` for unreadable or invalid payloads
//! - `500 Internal Server Error` with `"<message>\n"` when storage fails

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use shared::codec::SpanFormat;
use shared::ingest::{Cause, IngestRequest, Outcome};

/// Creates the span upload routes with application state.
pub fn span_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/spans", post(upload_spans))
        .with_state(state)
}

/// Reads the declared wire format from the `Content-Type` header.
fn span_format(headers: &HeaderMap) -> SpanFormat {
    SpanFormat::from_content_type(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Reads the `Content-Encoding` header, if present.
fn content_encoding(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_ENCODING)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Converts a pipeline outcome into an HTTP response.
fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Accepted => StatusCode::ACCEPTED.into_response(),
        Outcome::Rejected { message, cause } => {
            let status = match cause {
                Cause::Client => StatusCode::BAD_REQUEST,
                Cause::Server => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("{message}\n")).into_response()
        }
    }
}

/// Handler for span uploads.
async fn upload_spans(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = IngestRequest::new(content_encoding(&headers), span_format(&headers), body);
    outcome_response(state.pipeline().accept_spans(request).await)
}
