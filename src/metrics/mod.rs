//! # Metrics Collection Module
//!
//! Process-local request aggregates plus a mirror of the same events on the
//! `metrics` facade for Prometheus scraping.
//!
//! ## Metrics Exported
//!
//! **Counters:**
//! - `switchyard_requests_total{tier, status}` - Requests by outcome
//! - `switchyard_attempts_total{backend, outcome}` - Backend attempts
//! - `switchyard_cache_hits_total{tier}` - Requests served from cache
//!
//! **Histograms:**
//! - `switchyard_request_duration_seconds{tier}` - End-to-end duration

pub mod types;

pub use types::*;

use crate::classifier::Tier;
use crate::engine::AttemptOutcome;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Capacity of the end-to-end latency window.
pub const LATENCY_WINDOW: usize = 1_000;

/// Number of error samples retained.
pub const ERROR_SAMPLES: usize = 20;

#[derive(Debug)]
struct Aggregates {
    started: Instant,
    requests: RequestTotals,
    latencies: VecDeque<f64>,
    backends: HashMap<String, BackendUsage>,
    tiers: BTreeMap<String, u64>,
    errors: VecDeque<ErrorSample>,
}

impl Aggregates {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: RequestTotals::default(),
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            backends: HashMap::new(),
            tiers: BTreeMap::new(),
            errors: VecDeque::with_capacity(ERROR_SAMPLES),
        }
    }

    fn finish_request(&mut self, tier: Tier, elapsed: Duration) {
        self.requests.total += 1;
        *self.tiers.entry(tier.to_string()).or_insert(0) += 1;
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(elapsed.as_micros() as f64 / 1000.0);
    }

    fn backend(&mut self, backend_id: &str) -> &mut BackendUsage {
        self.backends
            .entry(backend_id.to_string())
            .or_insert_with(|| BackendUsage::new(backend_id))
    }

    fn push_error(&mut self, sample: ErrorSample) {
        if self.errors.len() == ERROR_SAMPLES {
            self.errors.pop_front();
        }
        self.errors.push_back(sample);
    }
}

/// Central sink for request and attempt events.
pub struct MetricsCollector {
    inner: Mutex<Aggregates>,
    /// Prometheus handle for rendering metrics, when a recorder is installed
    prometheus_handle: Option<PrometheusHandle>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Aggregates::new()),
            prometheus_handle: None,
        }
    }

    /// Collector that can render Prometheus text through `handle`.
    pub fn with_prometheus(handle: PrometheusHandle) -> Self {
        Self {
            inner: Mutex::new(Aggregates::new()),
            prometheus_handle: Some(handle),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Aggregates> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// One execution attempt against a backend.
    pub fn record_attempt(&self, backend_id: &str, outcome: AttemptOutcome) {
        metrics::counter!(
            "switchyard_attempts_total",
            "backend" => backend_id.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        let mut inner = self.lock();
        let usage = inner.backend(backend_id);
        match outcome {
            AttemptOutcome::Success => usage.success += 1,
            AttemptOutcome::Failure => usage.failure += 1,
            AttemptOutcome::Timeout => usage.timeout += 1,
            AttemptOutcome::Rejected => usage.rejected += 1,
        }
    }

    /// Attempt-level error, kept in the recent-error ring.
    pub fn record_error(&self, backend_id: Option<&str>, kind: &str, message: &str) {
        self.lock().push_error(ErrorSample {
            timestamp: Utc::now(),
            backend_id: backend_id.map(str::to_string),
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    /// Request answered from the cache.
    pub fn record_cache_hit(&self, tier: Tier, elapsed: Duration) {
        metrics::counter!("switchyard_cache_hits_total", "tier" => tier.as_str()).increment(1);
        self.mirror_request(tier, "cache_hit", elapsed);

        let mut inner = self.lock();
        inner.finish_request(tier, elapsed);
        inner.requests.succeeded += 1;
        inner.requests.cache_hits += 1;
    }

    /// Request answered by `backend_id`.
    pub fn record_success(&self, tier: Tier, backend_id: &str, elapsed: Duration) {
        self.mirror_request(tier, "success", elapsed);

        let mut inner = self.lock();
        inner.finish_request(tier, elapsed);
        inner.requests.succeeded += 1;
        inner.backend(backend_id).wins += 1;
    }

    /// Request that exhausted every candidate.
    pub fn record_failure(&self, tier: Tier, elapsed: Duration, message: &str) {
        self.mirror_request(tier, "failure", elapsed);

        let mut inner = self.lock();
        inner.finish_request(tier, elapsed);
        inner.requests.failed += 1;
        inner.push_error(ErrorSample {
            timestamp: Utc::now(),
            backend_id: None,
            kind: "all_candidates_failed".to_string(),
            message: message.to_string(),
        });
    }

    fn mirror_request(&self, tier: Tier, status: &'static str, elapsed: Duration) {
        metrics::counter!(
            "switchyard_requests_total",
            "tier" => tier.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("switchyard_request_duration_seconds", "tier" => tier.as_str())
            .record(elapsed.as_secs_f64());
    }

    /// Copy of every aggregate.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();

        let mut backends: Vec<BackendUsage> = inner.backends.values().cloned().collect();
        backends.sort_by(|a, b| a.backend_id.cmp(&b.backend_id));

        MetricsSnapshot {
            uptime_seconds: inner.started.elapsed().as_secs(),
            requests: inner.requests.clone(),
            latency: summarize(&inner.latencies),
            backends,
            tiers: inner.tiers.clone(),
            recent_errors: inner.errors.iter().cloned().collect(),
        }
    }

    /// Drop every aggregate and restart the uptime clock. Prometheus
    /// counters are monotonic and are left alone.
    pub fn reset(&self) {
        *self.lock() = Aggregates::new();
        tracing::info!("Metrics reset");
    }

    /// Prometheus text, or an empty string when no recorder is installed.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

fn summarize(latencies: &VecDeque<f64>) -> LatencySummary {
    if latencies.is_empty() {
        return LatencySummary::default();
    }
    let mut sorted: Vec<f64> = latencies.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);

    LatencySummary {
        samples: sorted.len(),
        avg_ms: Some(sorted.iter().sum::<f64>() / sorted.len() as f64),
        p50_ms: Some(percentile(&sorted, 0.50)),
        p95_ms: Some(percentile(&sorted, 0.95)),
        p99_ms: Some(percentile(&sorted, 0.99)),
    }
}

/// Nearest-rank percentile over an ascending, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Initialize Prometheus metrics exporter with custom histogram buckets.
///
/// Buckets are in seconds and sized for remote model calls:
/// [0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10, 15, 30].
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let duration_buckets = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("switchyard_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
