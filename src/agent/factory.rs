//! Agent factory for creating InferenceAgent trait objects from configuration.

use super::{AgentError, HttpAgent, InferenceAgent};
use crate::config::{BackendConfig, SwitchyardConfig};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

/// Agents keyed by backend id.
pub type AgentMap = HashMap<String, Arc<dyn InferenceAgent>>;

/// Create an agent from a backend descriptor.
///
/// The credential is read from the environment variable named by
/// `api_key_env`; a descriptor without `api_key_env` is sent unauthenticated.
///
/// # Examples
///
/// ```
/// use switchyard::agent::factory::create_agent;
/// use switchyard::config::{BackendConfig, Protocol};
/// use reqwest::Client;
/// use std::sync::Arc;
///
/// let config = BackendConfig::new("local", Protocol::Chat, "http://localhost:8000", "llama");
/// let agent = create_agent(&config, Arc::new(Client::new())).unwrap();
///
/// assert_eq!(agent.id(), "local");
/// ```
pub fn create_agent(
    config: &BackendConfig,
    client: Arc<Client>,
) -> Result<Arc<dyn InferenceAgent>, AgentError> {
    let api_key = match &config.api_key_env {
        Some(env_var) => Some(std::env::var(env_var).map_err(|e| {
            AgentError::Configuration(format!(
                "Backend '{}': failed to read API key from env var '{}': {}",
                config.id, env_var, e
            ))
        })?),
        None => None,
    };

    Ok(Arc::new(HttpAgent::new(config, api_key, client)))
}

/// Create one agent per configured backend, sharing a single client.
pub fn build_agents(config: &SwitchyardConfig, client: Arc<Client>) -> Result<AgentMap, AgentError> {
    config
        .backends
        .iter()
        .map(|backend| Ok((backend.id.clone(), create_agent(backend, Arc::clone(&client))?)))
        .collect()
}
