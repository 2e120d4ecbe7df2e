//! Error types for agent operations.

use thiserror::Error;

/// Errors that can occur while calling a backend.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Transport-level timeout reported by the HTTP client.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Backend returned an error response (4xx, 5xx).
    #[error("Backend error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Backend response doesn't match the expected wire shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Agent configuration error (missing credential, bad URL).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Short machine-readable kind used in telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Network(_) => "network",
            AgentError::Timeout(_) => "timeout",
            AgentError::Upstream { .. } => "upstream",
            AgentError::InvalidResponse(_) => "invalid_response",
            AgentError::Configuration(_) => "configuration",
        }
    }
}
