//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::{load_or_default, ServeArgs};
use crate::config::SwitchyardConfig;
use crate::engine::Orchestrator;
use crate::metrics::{setup_metrics, MetricsCollector};
use anyhow::Context;
use std::sync::Arc;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(args: &ServeArgs) -> anyhow::Result<SwitchyardConfig> {
    let mut config = load_or_default(&args.config)?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(mode) = args.mode {
        config.engine.mode = mode;
    }

    Ok(config)
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    crate::logging::init_tracing(&config.logging)?;
    tracing::info!(
        backends = config.backends.len(),
        mode = ?config.engine.mode,
        "Starting Switchyard"
    );
    tracing::debug!(?config, "Loaded configuration");

    let metrics = match setup_metrics() {
        Ok(handle) => MetricsCollector::with_prometheus(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus exporter unavailable");
            MetricsCollector::new()
        }
    };
    let orchestrator = Arc::new(
        Orchestrator::from_config(&config)
            .context("failed to build orchestrator")?
            .with_metrics(Arc::new(metrics)),
    );

    let state = Arc::new(AppState::new(Arc::clone(&orchestrator), Arc::new(config.clone())));
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Switchyard API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        pending = orchestrator.pending_attempts(),
        "Waiting for background attempts"
    );
    orchestrator.drain().await;

    tracing::info!("Switchyard server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn args(config: PathBuf) -> ServeArgs {
        ServeArgs {
            config,
            port: None,
            host: None,
            log_level: None,
            mode: None,
        }
    }

    #[test]
    fn test_serve_config_loading() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8081").unwrap();

        let config = load_config_with_overrides(&args(temp.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_serve_cli_overrides_config() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            "[server]\nport = 8081\n[engine]\nmode = \"sequential\"",
        )
        .unwrap();

        let mut args = args(temp.path().to_path_buf());
        args.port = Some(9000);
        args.mode = Some(ExecutionMode::Parallel);

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.mode, ExecutionMode::Parallel);
    }

    #[test]
    fn test_serve_works_without_config_file() {
        let config = load_config_with_overrides(&args(PathBuf::from("nonexistent.toml"))).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
