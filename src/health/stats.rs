//! Per-backend rolling statistics.

use crate::engine::AttemptOutcome;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Rolling call statistics for a single backend.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    /// Calls that reached the backend (rejections excluded)
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
    /// Attempts the breaker refused to admit
    pub rejected: u64,
    /// Independent of the breaker's counter; only feeds the stability penalty
    pub consecutive_failures: u32,
    /// Set once `total` reaches the warm-up threshold
    pub warmed_up: bool,
    /// Successful-call latencies in milliseconds, oldest first
    #[serde(skip)]
    latencies: VecDeque<f64>,
    #[serde(skip)]
    window: usize,
}

impl ModelStats {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            total: 0,
            success: 0,
            failure: 0,
            timeout: 0,
            rejected: 0,
            consecutive_failures: 0,
            warmed_up: false,
            latencies: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Fold one attempt into the counters.
    pub fn record(&mut self, outcome: AttemptOutcome, latency: Duration, warmup_threshold: u64) {
        match outcome {
            AttemptOutcome::Success => {
                self.total += 1;
                self.success += 1;
                self.consecutive_failures = 0;
                if self.latencies.len() == self.window {
                    self.latencies.pop_front();
                }
                self.latencies.push_back(latency.as_micros() as f64 / 1000.0);
            }
            AttemptOutcome::Failure => {
                self.total += 1;
                self.failure += 1;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
            AttemptOutcome::Timeout => {
                self.total += 1;
                self.timeout += 1;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
            AttemptOutcome::Rejected => {
                self.rejected += 1;
            }
        }

        if !self.warmed_up && self.total >= warmup_threshold {
            self.warmed_up = true;
        }
    }

    pub fn success_rate(&self) -> f64 {
        ratio(self.success, self.total)
    }

    pub fn timeout_rate(&self) -> f64 {
        ratio(self.timeout, self.total)
    }

    pub fn latency_samples(&self) -> usize {
        self.latencies.len()
    }

    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        Some(self.latencies.iter().sum::<f64>() / self.latencies.len() as f64)
    }

    /// `1 - (max - min) / avg` over the latency window, clamped to [0, 1].
    /// Perfect (1.0) with fewer than two samples.
    pub fn consistency(&self) -> f64 {
        if self.latencies.len() < 2 {
            return 1.0;
        }
        let avg = self.avg_latency_ms().unwrap_or(0.0);
        if avg <= 0.0 {
            return 1.0;
        }
        let max = self.latencies.iter().copied().fold(f64::MIN, f64::max);
        let min = self.latencies.iter().copied().fold(f64::MAX, f64::min);
        (1.0 - (max - min) / avg).clamp(0.0, 1.0)
    }

    /// `successRate - 0.5 * timeoutRate`, clamped, halved once the
    /// consecutive-failure count reaches `penalty_threshold`.
    pub fn stability(&self, penalty_threshold: u32) -> f64 {
        let base = (self.success_rate() - 0.5 * self.timeout_rate()).clamp(0.0, 1.0);
        if penalty_threshold > 0 && self.consecutive_failures >= penalty_threshold {
            base * 0.5
        } else {
            base
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
