//! Endpoint handlers. Each one is a thin wrapper over an [`Orchestrator`] call.
//!
//! [`Orchestrator`]: crate::engine::Orchestrator

use super::{ApiError, AppState};
use crate::breaker::BreakerSnapshot;
use crate::engine::{ChatRequest, OrchestrationResult};
use crate::health::HealthScore;
use crate::metrics::MetricsSnapshot;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// POST /v1/chat - Orchestrate one chat request.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<OrchestrationResult>, ApiError> {
    let Json(request) = body?;
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("'text' must not be empty"));
    }
    let result = state.orchestrator.handle(request).await?;
    Ok(Json(result))
}

/// GET /v1/metrics - Aggregate request metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.orchestrator.metrics_snapshot())
}

/// POST /v1/metrics/reset - Zero request metrics and health stats.
pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> StatusCode {
    state.orchestrator.reset_metrics();
    StatusCode::NO_CONTENT
}

/// Breaker view returned by GET /v1/breakers.
#[derive(Debug, Serialize)]
pub struct BreakersResponse {
    /// Backend id → mode
    pub states: BTreeMap<String, String>,
    pub details: BTreeMap<String, BreakerSnapshot>,
}

/// GET /v1/breakers - Breaker mode per backend.
pub async fn breakers(State(state): State<Arc<AppState>>) -> Json<BreakersResponse> {
    let states = state
        .orchestrator
        .breaker_states()
        .into_iter()
        .map(|(id, mode)| (id, mode.to_string()))
        .collect();
    Json(BreakersResponse {
        states,
        details: state.orchestrator.breakers().snapshots(),
    })
}

/// Per-backend health view returned by GET /v1/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub uptime_seconds: u64,
    pub backends: Vec<HealthScore>,
}

/// GET /v1/health - Derived health scores for every backend.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backends: state.orchestrator.health_report(),
    })
}

/// DELETE /v1/cache - Drop every cached reply.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.orchestrator.clear_cache();
    StatusCode::NO_CONTENT
}

/// GET /metrics - Prometheus text format.
///
/// Always returns 200, with an empty body when no recorder is installed.
pub async fn prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.orchestrator.metrics().render_metrics(),
    )
}
