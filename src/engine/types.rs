//! Request and result types for the orchestration engine.

use crate::agent::{Turn, Usage};
use crate::classifier::{ComplexityAnalysis, Tier};
use serde::{Deserialize, Serialize};

/// A chat request as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<Turn>,
    /// The new user message
    pub text: String,
    /// Force a single backend, bypassing tier selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            text: text.into(),
            backend: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// History followed by the new text as a user turn.
    pub fn turns(&self) -> Vec<Turn> {
        let mut turns = self.history.clone();
        turns.push(Turn::user(self.text.clone()));
        turns
    }
}

/// How one attempt against one backend ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    /// The breaker refused the call; the backend was never contacted
    Rejected,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Rejected => "rejected",
        }
    }
}

/// One try against one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionAttempt {
    /// Position in the candidate order, starting at 0
    pub position: usize,
    pub backend_id: String,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final payload of a successful request.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub request_id: String,
    pub text: String,
    /// Backend that produced `text` (the original one on a cache hit)
    pub backend_id: String,
    pub tier: Tier,
    /// Rule of the tier cascade that fired
    pub reason: String,
    pub confidence: f32,
    pub analysis: ComplexityAnalysis,
    pub served_from_cache: bool,
    /// Ordered by position; empty on a cache hit.
    ///
    /// Sequential mode lists every attempt made, so positions run from 0
    /// without gaps. Parallel mode lists only the attempts that reported
    /// before the winner, so positions can start above 0 or skip values
    /// (a fast winner at position 1 gives `[1]`). Each entry keeps the
    /// candidate's position, never a renumbered index.
    pub attempts: Vec<ExecutionAttempt>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Value stored in the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedReply {
    pub text: String,
    pub backend_id: String,
    pub usage: Option<Usage>,
}
