//! Engine error types

use super::{AttemptOutcome, ExecutionAttempt};
use crate::agent::AgentError;
use crate::breaker::BreakerError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// Breaker refused the call; nothing was sent
    #[error("circuit breaker open")]
    BreakerOpen,

    /// Call exceeded its deadline
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Non-2xx status, malformed payload or transport failure
    #[error("backend error: {0}")]
    Backend(#[source] AgentError),
}

impl AttemptError {
    /// Telemetry kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::BreakerOpen => "breaker_open",
            AttemptError::Timeout(_) => "timeout",
            AttemptError::Backend(_) => "backend_error",
        }
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            AttemptError::BreakerOpen => AttemptOutcome::Rejected,
            AttemptError::Timeout(_) => AttemptOutcome::Timeout,
            AttemptError::Backend(_) => AttemptOutcome::Failure,
        }
    }
}

impl From<BreakerError<AgentError>> for AttemptError {
    fn from(err: BreakerError<AgentError>) -> Self {
        match err {
            BreakerError::Open => AttemptError::BreakerOpen,
            BreakerError::Timeout(limit) => AttemptError::Timeout(limit),
            BreakerError::Failed(AgentError::Timeout(ms)) => {
                AttemptError::Timeout(Duration::from_millis(ms))
            }
            BreakerError::Failed(e) => AttemptError::Backend(e),
        }
    }
}

/// One contributing error of an exhausted request.
#[derive(Debug)]
pub struct BackendFailure {
    pub backend_id: String,
    pub error: AttemptError,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend_id, self.error)
    }
}

/// Errors surfaced to the caller of `handle`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Every candidate failed, or the request deadline passed first
    #[error("all candidates failed: {}", summarize(.failures))]
    AllCandidatesFailed {
        attempts: Vec<ExecutionAttempt>,
        failures: Vec<BackendFailure>,
    },

    /// Missing credential, unknown backend id or empty tier. Never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::AllCandidatesFailed { .. } => "all_candidates_failed",
            EngineError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

fn summarize(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no attempt completed before the deadline".to_string();
    }
    failures
        .iter()
        .map(BackendFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
