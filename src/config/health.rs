//! Health registry tuning

use serde::{Deserialize, Serialize};

/// Knobs for the rolling health statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Calls before a backend's score replaces the neutral 0.5
    pub warmup_threshold: u64,
    /// Calls before a backend's score is trusted at full confidence
    pub confidence_threshold: u64,
    /// Capacity of the recent-latency window
    pub latency_window: usize,
    /// Relative score difference under which cost breaks the tie
    pub similarity_band: f64,
    /// Registry-side consecutive failures before stability is halved
    pub penalty_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            warmup_threshold: 5,
            confidence_threshold: 20,
            latency_window: 20,
            similarity_band: 0.05,
            penalty_threshold: 3,
        }
    }
}
