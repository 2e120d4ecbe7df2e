//! Backend agents.
//!
//! This module provides the `InferenceAgent` trait the engine calls, and the
//! `WireAdapter` codecs that translate a backend-agnostic list of [`Turn`]s into
//! each backend's wire shape and back.

use async_trait::async_trait;
use reqwest::RequestBuilder;

pub mod chat;
pub mod error;
pub mod factory;
pub mod http;
pub mod turn;
pub mod types;

// Re-export key types for convenience
pub use error::AgentError;
pub use factory::{build_agents, create_agent, AgentMap};
pub use http::HttpAgent;
pub use types::{Completion, GenerationParams, Role, Turn, Usage};

use crate::config::Protocol;

/// Unified interface for all remote inference backends.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn InferenceAgent>`.
/// All async methods use `async_trait` for compatibility with trait objects.
///
/// # Cancellation Safety
///
/// Dropping the future returned by [`complete`](InferenceAgent::complete) aborts
/// the in-flight HTTP request.
#[async_trait]
pub trait InferenceAgent: Send + Sync + 'static {
    /// Backend identifier this agent serves.
    fn id(&self) -> &str;

    /// Wire protocol spoken by the backend.
    fn protocol(&self) -> Protocol;

    /// Send the conversation and return the decoded reply.
    ///
    /// # Returns
    ///
    /// - `Ok(Completion)` on success
    /// - `Err(AgentError::Upstream)` if backend returned a non-2xx status
    /// - `Err(AgentError::Network)` if connection failed
    /// - `Err(AgentError::InvalidResponse)` if the body doesn't match the wire shape
    async fn complete(&self, turns: &[Turn]) -> Result<Completion, AgentError>;
}

/// Encoder/decoder pair for one wire protocol.
pub trait WireAdapter: Send + Sync {
    /// Full request URL for `model` at `base_url`.
    fn endpoint(&self, base_url: &str, model: &str) -> String;

    /// Attach credentials the way the protocol expects.
    fn authorize(&self, request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder;

    /// Build the JSON request body.
    fn encode(&self, turns: &[Turn], model: &str, params: &GenerationParams)
        -> serde_json::Value;

    /// Parse a 2xx response body.
    fn decode(&self, body: &[u8]) -> Result<Completion, AgentError>;
}

/// Codec for a protocol variant.
pub fn adapter_for(protocol: Protocol) -> &'static dyn WireAdapter {
    match protocol {
        Protocol::Chat => &chat::ChatAdapter,
        Protocol::Turn => &turn::TurnAdapter,
    }
}

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}
