//! Configuration module for Switchyard
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`SWITCHYARD_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use switchyard::config::SwitchyardConfig;
//!
//! let toml = r#"
//! [engine]
//! mode = "parallel"
//!
//! [[backends]]
//! id = "gpt-mini"
//! protocol = "chat"
//! url = "https://api.openai.com"
//! model = "gpt-4o-mini"
//!
//! [tiers]
//! simple = ["gpt-mini"]
//! "#;
//! let config: SwitchyardConfig = toml::from_str(toml).unwrap();
//! assert!(config.validate().is_ok());
//! ```

pub mod backend;
pub mod breaker;
pub mod cache;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;
pub mod server;
pub mod tiers;

pub use backend::{BackendConfig, Protocol};
pub use breaker::{BreakerConfig, BreakerSettings};
pub use cache::CacheConfig;
pub use classifier::ClassifierConfig;
pub use engine::{EngineConfig, ExecutionMode};
pub use error::ConfigError;
pub use health::HealthConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;
pub use tiers::TierTable;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SwitchyardConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Execution mode and request deadline
    pub engine: EngineConfig,
    /// Tier cascade thresholds
    pub classifier: ClassifierConfig,
    /// Response cache sizing
    pub cache: CacheConfig,
    /// Circuit breaker defaults
    pub breaker: BreakerConfig,
    /// Health registry tuning
    pub health: HealthConfig,
    /// Ordered backend descriptors
    pub backends: Vec<BackendConfig>,
    /// Tier membership
    pub tiers: TierTable,
}

impl SwitchyardConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are ignored and the previous value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("SWITCHYARD_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("SWITCHYARD_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("SWITCHYARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SWITCHYARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(mode) = std::env::var("SWITCHYARD_MODE") {
            if let Ok(m) = mode.parse() {
                self.engine.mode = m;
            }
        }
        if let Ok(cache) = std::env::var("SWITCHYARD_CACHE") {
            self.cache.enabled = cache.to_lowercase() == "true";
        }

        self
    }

    /// Look up a backend descriptor by id.
    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::Validation {
                field: "cache.capacity".to_string(),
                message: "capacity must be at least 1".to_string(),
            });
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation {
                field: "breaker.failure_threshold".to_string(),
                message: "threshold must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].id", i),
                    message: format!("duplicate backend id '{}'", backend.id),
                });
            }
            if backend.url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].url", i),
                    message: "URL cannot be empty".to_string(),
                });
            }
            if backend.cost_per_unit < 0.0 {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].cost_per_unit", i),
                    message: "cost cannot be negative".to_string(),
                });
            }
            if backend.failure_threshold == Some(0) {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].failure_threshold", i),
                    message: "threshold must be at least 1".to_string(),
                });
            }
        }

        for (tier, id) in self.tiers.entries() {
            if !seen.contains(id) {
                return Err(ConfigError::UnknownBackend {
                    tier: tier.to_string(),
                    backend: id.to_string(),
                });
            }
        }

        Ok(())
    }
}
