//! # HTTP API
//!
//! Thin axum surface over the orchestrator.
//!
//! ## Endpoints
//!
//! - `POST /v1/chat` - Orchestrate a chat request
//! - `GET /v1/metrics` - Aggregate metrics
//! - `POST /v1/metrics/reset` - Reset metrics and health stats
//! - `GET /v1/breakers` - Breaker mode per backend
//! - `GET /v1/health` - Health scores per backend
//! - `DELETE /v1/cache` - Clear the response cache
//! - `GET /metrics` - Prometheus text format
//!
//! ## Error Handling
//!
//! Errors use an OpenAI-style envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "all candidates failed: gpt-mini: timed out after 8000ms",
//!     "type": "server_error",
//!     "code": "service_unavailable"
//!   }
//! }
//! ```

mod error;
mod handlers;

pub use error::{ApiError, ApiErrorBody};
pub use handlers::{BreakersResponse, HealthResponse};

use crate::config::SwitchyardConfig;
use crate::engine::Orchestrator;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<SwitchyardConfig>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<SwitchyardConfig>) -> Self {
        Self {
            orchestrator,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    Router::new()
        .route("/v1/chat", post(handlers::chat))
        .route("/v1/metrics", get(handlers::metrics))
        .route("/v1/metrics/reset", post(handlers::reset_metrics))
        .route("/v1/breakers", get(handlers::breakers))
        .route("/v1/health", get(handlers::health))
        .route("/v1/cache", delete(handlers::clear_cache))
        .route("/metrics", get(handlers::prometheus))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
