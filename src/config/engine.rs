//! Orchestration engine configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How the candidates of a request are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One candidate at a time, advancing only on failure
    #[default]
    Sequential,
    /// All candidates at once, first success wins
    Parallel,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" | "race" => Ok(ExecutionMode::Parallel),
            _ => Err(format!("Unknown execution mode: {}", s)),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ExecutionMode,
    /// Upper bound on total orchestration time for one request
    pub request_deadline_ms: u64,
}

impl EngineConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            request_deadline_ms: 10_000,
        }
    }
}
