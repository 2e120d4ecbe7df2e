//! Circuit breaker defaults

use super::BackendConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide breaker defaults; each backend may override any field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Maximum wall-clock time for one backend call
    pub timeout_ms: u64,
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// Cool-down before an open breaker admits a trial call
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
        }
    }
}

/// Resolved settings for a single breaker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub timeout: Duration,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl BreakerConfig {
    /// Merge the defaults with a backend's overrides.
    pub fn resolve(&self, backend: &BackendConfig) -> BreakerSettings {
        BreakerSettings {
            timeout: Duration::from_millis(backend.timeout_ms.unwrap_or(self.timeout_ms)),
            failure_threshold: backend
                .failure_threshold
                .unwrap_or(self.failure_threshold),
            reset_timeout: Duration::from_millis(
                backend.reset_timeout_ms.unwrap_or(self.reset_timeout_ms),
            ),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        BreakerConfig::default().into()
    }
}

impl From<BreakerConfig> for BreakerSettings {
    fn from(config: BreakerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
        }
    }
}
