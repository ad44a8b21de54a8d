//! Health check endpoint.
//!
//! Reports liveness for load balancers along with the collector's counters,
//! so a quick `curl /health` shows whether uploads are arriving and being dropped.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use shared::collector::MetricsSnapshot;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Transport the counters belong to.
    pub transport: String,
    /// Collector counters since startup.
    pub collector: MetricsSnapshot,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "spanline-api",
        version: env!("CARGO_PKG_VERSION"),
        transport: state.metrics().transport().to_string(),
        collector: state.metrics().snapshot(),
    })
}
