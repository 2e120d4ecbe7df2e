//! HTTP transport shared by both wire protocols.

use super::{adapter_for, AgentError, Completion, GenerationParams, InferenceAgent, Turn};
use crate::config::{BackendConfig, Protocol};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Connection establishment limit for the shared client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared client used by every agent.
pub fn default_client() -> Result<Client, AgentError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| AgentError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Agent that POSTs an encoded conversation to a remote backend.
///
/// Whole-call timeouts are owned by the backend's circuit breaker; the client
/// only bounds connection establishment.
pub struct HttpAgent {
    id: String,
    protocol: Protocol,
    /// Base URL (e.g., "https://api.openai.com")
    base_url: String,
    model: String,
    api_key: Option<String>,
    params: GenerationParams,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl HttpAgent {
    pub fn new(config: &BackendConfig, api_key: Option<String>, client: Arc<Client>) -> Self {
        Self {
            id: config.id.clone(),
            protocol: config.protocol,
            base_url: config.url.clone(),
            model: config.model.clone(),
            api_key,
            params: GenerationParams {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
            client,
        }
    }
}

#[async_trait]
impl InferenceAgent for HttpAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Completion, AgentError> {
        let adapter = adapter_for(self.protocol);
        let url = adapter.endpoint(&self.base_url, &self.model);
        let body = adapter.encode(turns, &self.model, &self.params);

        let request = adapter.authorize(self.client.post(&url), self.api_key.as_deref());
        let response = request.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(CONNECT_TIMEOUT.as_millis() as u64)
            } else {
                AgentError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;

        adapter.decode(&bytes)
    }
}
