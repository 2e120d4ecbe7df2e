//! CLI module for Switchyard
//!
//! # Commands
//!
//! - `serve` - Start the gateway
//! - `classify` - Run the tier cascade on a piece of text offline
//! - `backends` - List configured backends and their tiers
//! - `config` - Configuration utilities (init)
//!
//! # Example
//!
//! ```bash
//! switchyard config init
//! switchyard classify "Explain the borrow checker" --json
//! switchyard serve --mode parallel
//! ```

pub mod backends;
pub mod classify;
pub mod config;
pub mod output;
pub mod serve;

pub use backends::handle_backends;
pub use classify::handle_classify;
pub use config::handle_config_init;

use crate::config::{ExecutionMode, SwitchyardConfig};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG: &str = "switchyard.toml";

/// Switchyard - Tier-aware LLM gateway
#[derive(Parser, Debug)]
#[command(
    name = "switchyard",
    version,
    about = "Tier-aware LLM gateway with circuit breaking, caching and health-ranked fallback"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway
    Serve(ServeArgs),
    /// Classify text into a tier without calling any backend
    Classify(ClassifyArgs),
    /// List configured backends
    Backends(BackendsArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "SWITCHYARD_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "SWITCHYARD_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SWITCHYARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Execution mode (sequential, parallel)
    #[arg(short, long, env = "SWITCHYARD_MODE")]
    pub mode: Option<ExecutionMode>,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Text to classify
    pub text: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file (classifier thresholds)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct BackendsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Load `path` when it exists, defaults otherwise, then apply env overrides.
pub fn load_or_default(path: &Path) -> anyhow::Result<SwitchyardConfig> {
    let config = if path.exists() {
        SwitchyardConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        SwitchyardConfig::default()
    };
    Ok(config.with_env_overrides())
}
