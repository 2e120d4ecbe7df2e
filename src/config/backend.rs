//! Backend configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol spoken by a backend.
///
/// The two variants have mutually incompatible request and response shapes;
/// see [`crate::agent::chat`] and [`crate::agent::turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Flat `{role, content}` messages, text at `choices[0].message.content`
    Chat,
    /// `{role: user|model, parts: [{text}]}` contents plus a `generationConfig`
    Turn,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Chat => write!(f, "chat"),
            Protocol::Turn => write!(f, "turn"),
        }
    }
}

/// Static descriptor of one remote backend.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique identifier used by tiers, breakers and health stats
    pub id: String,
    pub protocol: Protocol,
    /// Base URL (e.g., "https://api.openai.com")
    pub url: String,
    /// Model name sent upstream
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Nominal cost per unit of output, used to break health ties
    #[serde(default = "default_cost")]
    pub cost_per_unit: f64,
    /// Per-backend breaker call timeout override
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Per-backend consecutive-failure threshold override
    #[serde(default)]
    pub failure_threshold: Option<u32>,
    /// Per-backend cool-down override
    #[serde(default)]
    pub reset_timeout_ms: Option<u64>,
}

fn default_cost() -> f64 {
    1.0
}

impl BackendConfig {
    /// Minimal descriptor with defaults for every optional field.
    pub fn new(id: &str, protocol: Protocol, url: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            protocol,
            url: url.to_string(),
            model: model.to_string(),
            api_key_env: None,
            temperature: None,
            max_output_tokens: None,
            cost_per_unit: default_cost(),
            timeout_ms: None,
            failure_threshold: None,
            reset_timeout_ms: None,
        }
    }

    /// Builder-style cost setter.
    pub fn with_cost(mut self, cost_per_unit: f64) -> Self {
        self.cost_per_unit = cost_per_unit;
        self
    }
}
