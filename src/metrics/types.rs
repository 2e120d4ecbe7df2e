//! # Metrics Types
//!
//! Serializable views returned by `getMetrics()` and `GET /v1/metrics`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time copy of every aggregate the collector keeps.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the collector was created or last reset
    pub uptime_seconds: u64,
    pub requests: RequestTotals,
    pub latency: LatencySummary,
    /// Per-backend usage, sorted by backend id
    pub backends: Vec<BackendUsage>,
    /// Requests per classified tier
    pub tiers: BTreeMap<String, u64>,
    /// Most recent errors, oldest first
    pub recent_errors: Vec<ErrorSample>,
}

/// Request-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestTotals {
    /// Every request that reached the engine
    pub total: u64,
    /// Requests answered by a backend or the cache
    pub succeeded: u64,
    /// Requests that exhausted their candidates
    pub failed: u64,
    /// Requests answered from the cache
    pub cache_hits: u64,
}

/// End-to-end latency percentiles over the rolling window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub avg_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

/// Attempt counts for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendUsage {
    pub backend_id: String,
    /// Requests this backend answered
    pub wins: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
    /// Attempts refused by an open breaker
    pub rejected: u64,
}

impl BackendUsage {
    pub(crate) fn new(backend_id: &str) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            ..Self::default()
        }
    }

    /// Attempts of any outcome.
    pub fn attempts(&self) -> u64 {
        self.success + self.failure + self.timeout + self.rejected
    }
}

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSample {
    pub timestamp: DateTime<Utc>,
    /// `None` for request-level errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    pub kind: String,
    pub message: String,
}
