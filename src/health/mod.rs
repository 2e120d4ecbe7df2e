//! Backend health registry.
//!
//! Accumulates [`ModelStats`] from every execution attempt and turns them into
//! a comparative health score used to order candidates within a tier:
//!
//! ```text
//! health = 0.45*successRate + 0.30*consistency + 0.20*normalizedSpeed + 0.05*stability
//!        * (0.5 + 0.5*min(total/confidenceThreshold, 1))
//!        * breaker factor (OPEN 0.1, HALF_OPEN 0.5)
//! ```
//!
//! Before warm-up the score is a neutral 0.5 (still subject to the breaker
//! factor). `normalizedSpeed` is relative to the other candidates being ranked.

mod stats;


pub use stats::ModelStats;

use crate::breaker::{BreakerSet, BreakerState};
use crate::config::{HealthConfig, SwitchyardConfig};
use crate::engine::AttemptOutcome;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone)]
struct BackendHealth {
    stats: ModelStats,
    cost: f64,
}

/// Derived scores for one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScore {
    pub backend_id: String,
    pub score: f64,
    pub success_rate: f64,
    pub consistency: f64,
    pub normalized_speed: f64,
    pub stability: f64,
    pub avg_latency_ms: Option<f64>,
    pub total_calls: u64,
    pub rejected: u64,
    pub consecutive_failures: u32,
    pub warmed_up: bool,
    pub breaker: BreakerState,
    pub cost: f64,
}

/// Process-wide per-backend statistics and ranking.
pub struct HealthRegistry {
    backends: DashMap<String, BackendHealth>,
    breakers: Arc<BreakerSet>,
    config: HealthConfig,
}

impl HealthRegistry {
    pub fn new(config: HealthConfig, breakers: Arc<BreakerSet>) -> Self {
        Self {
            backends: DashMap::new(),
            breakers,
            config,
        }
    }

    /// One stats entry per configured backend.
    pub fn from_config(config: &SwitchyardConfig, breakers: Arc<BreakerSet>) -> Self {
        let registry = Self::new(config.health.clone(), breakers);
        for backend in &config.backends {
            registry.register(&backend.id, backend.cost_per_unit);
        }
        registry
    }

    /// Register a backend with its nominal cost. Existing stats are kept.
    pub fn register(&self, id: &str, cost: f64) {
        self.backends
            .entry(id.to_string())
            .and_modify(|entry| entry.cost = cost)
            .or_insert_with(|| BackendHealth {
                stats: ModelStats::new(self.config.latency_window),
                cost,
            });
    }

    /// Fold one attempt into the backend's stats.
    pub fn record_execution(&self, id: &str, outcome: AttemptOutcome, latency: Duration) {
        let mut entry = self
            .backends
            .entry(id.to_string())
            .or_insert_with(|| BackendHealth {
                stats: ModelStats::new(self.config.latency_window),
                cost: 1.0,
            });
        let was_warm = entry.stats.warmed_up;
        entry.stats.record(outcome, latency, self.config.warmup_threshold);
        if !was_warm && entry.stats.warmed_up {
            tracing::debug!(backend = %id, total = entry.stats.total, "Backend warm-up complete");
        }
    }

    /// Copy of a backend's stats.
    pub fn stats(&self, id: &str) -> Option<ModelStats> {
        self.backends.get(id).map(|entry| entry.stats.clone())
    }

    /// Scores for `candidates`, with speed normalized across them.
    /// Unknown ids are skipped.
    pub fn health_scores(&self, candidates: &[String]) -> Vec<HealthScore> {
        let snapshot: Vec<(String, BackendHealth)> = candidates
            .iter()
            .filter_map(|id| self.backends.get(id).map(|e| (id.clone(), e.value().clone())))
            .collect();

        let averages: Vec<f64> = snapshot
            .iter()
            .filter_map(|(_, h)| h.stats.avg_latency_ms())
            .collect();
        let tier_min = averages.iter().copied().fold(f64::INFINITY, f64::min);
        let tier_max = averages.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        snapshot
            .into_iter()
            .map(|(id, health)| self.score(id, &health, tier_min, tier_max))
            .collect()
    }

    fn score(
        &self,
        backend_id: String,
        health: &BackendHealth,
        tier_min: f64,
        tier_max: f64,
    ) -> HealthScore {
        let stats = &health.stats;
        let avg_latency_ms = stats.avg_latency_ms();

        let spread = tier_max - tier_min;
        let normalized_speed = match avg_latency_ms {
            Some(avg) if spread.is_finite() && spread > f64::EPSILON => {
                (1.0 - (avg - tier_min) / spread).clamp(0.0, 1.0)
            }
            _ => 0.5,
        };

        let success_rate = stats.success_rate();
        let consistency = stats.consistency();
        let stability = stats.stability(self.config.penalty_threshold);

        let base = if stats.warmed_up {
            let weighted = 0.45 * success_rate
                + 0.30 * consistency
                + 0.20 * normalized_speed
                + 0.05 * stability;
            let maturity = if self.config.confidence_threshold == 0 {
                1.0
            } else {
                (stats.total as f64 / self.config.confidence_threshold as f64).min(1.0)
            };
            weighted * (0.5 + 0.5 * maturity)
        } else {
            NEUTRAL_SCORE
        };

        let breaker = self
            .breakers
            .state(&backend_id)
            .unwrap_or(BreakerState::Closed);
        let breaker_factor = match breaker {
            BreakerState::Closed => 1.0,
            BreakerState::HalfOpen => 0.5,
            BreakerState::Open => 0.1,
        };

        HealthScore {
            backend_id,
            score: base * breaker_factor,
            success_rate,
            consistency,
            normalized_speed,
            stability,
            avg_latency_ms,
            total_calls: stats.total,
            rejected: stats.rejected,
            consecutive_failures: stats.consecutive_failures,
            warmed_up: stats.warmed_up,
            breaker,
            cost: health.cost,
        }
    }

    /// Candidate ids, best first. Unregistered ids keep their relative
    /// order after the ranked ones.
    pub fn order_by_health(&self, candidates: &[String]) -> Vec<String> {
        let ranked = rank_by_health(self.health_scores(candidates), self.config.similarity_band);
        tracing::debug!(
            order = ?ranked.iter().map(|s| (s.backend_id.as_str(), s.score)).collect::<Vec<_>>(),
            "Ordered candidates by health"
        );

        let mut ordered: Vec<String> = ranked.into_iter().map(|s| s.backend_id).collect();
        for id in candidates {
            if !ordered.contains(id) {
                ordered.push(id.clone());
            }
        }
        ordered
    }

    /// Scores for every registered backend, sorted by id.
    pub fn report(&self) -> Vec<HealthScore> {
        let mut ids: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        self.health_scores(&ids)
    }

    /// Zero every backend's stats. Registrations and costs are kept.
    pub fn reset(&self) {
        for mut entry in self.backends.iter_mut() {
            entry.stats = ModelStats::new(self.config.latency_window);
        }
    }
}

fn within_band(a: f64, b: f64, band: f64) -> bool {
    let hi = a.abs().max(b.abs());
    if hi <= f64::EPSILON {
        return true;
    }
    (a - b).abs() / hi < band
}

/// Sort descending by score; neighbours whose scores differ by less than
/// `band` (relative) are ordered by ascending cost instead.
pub fn rank_by_health(mut scores: Vec<HealthScore>, band: f64) -> Vec<HealthScore> {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));

    for i in 1..scores.len() {
        let mut j = i;
        while j > 0
            && within_band(scores[j - 1].score, scores[j].score, band)
            && scores[j].cost < scores[j - 1].cost
        {
            scores.swap(j - 1, j);
            j -= 1;
        }
    }
    scores
}
