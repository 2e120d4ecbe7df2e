//! Shared test utilities for Switchyard integration tests.
//!
//! Backends are `mockito` servers speaking either wire protocol, wired into
//! a real [`Orchestrator`] through the HTTP agents.

#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use switchyard::api::{create_router, AppState};
use switchyard::config::{BackendConfig, ExecutionMode, Protocol, SwitchyardConfig};
use switchyard::engine::Orchestrator;

/// UUID v4 string length: "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
pub const UUID_V4_STRING_LEN: usize = 36;

pub const CHAT_PATH: &str = "/v1/chat/completions";

pub fn turn_path(model: &str) -> String {
    format!("/v1beta/models/{}:generateContent", model)
}

/// Chat-style success body.
pub fn chat_body(text: &str) -> String {
    json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 4, "completion_tokens": 6, "total_tokens": 10}
    })
    .to_string()
}

/// Turn-style success body.
pub fn turn_body(text: &str) -> String {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}
    })
    .to_string()
}

/// Chat backend that always answers `text`.
pub async fn chat_ok(server: &mut ServerGuard, text: &str) -> Mock {
    server
        .mock("POST", CHAT_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(text))
        .create_async()
        .await
}

/// Turn backend (model `model`) that always answers `text`.
pub async fn turn_ok(server: &mut ServerGuard, model: &str, text: &str) -> Mock {
    server
        .mock("POST", turn_path(model).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(turn_body(text))
        .create_async()
        .await
}

/// Chat backend that always fails with `status`.
pub async fn chat_status(server: &mut ServerGuard, status: usize) -> Mock {
    server
        .mock("POST", CHAT_PATH)
        .with_status(status)
        .with_body("upstream unavailable")
        .create_async()
        .await
}

/// Backend descriptor pointing at `server`.
pub fn backend(id: &str, protocol: Protocol, server: &ServerGuard) -> BackendConfig {
    BackendConfig::new(id, protocol, &server.url(), id)
}

/// Config where every tier lists `backends` in the given order.
pub fn config_for(backends: Vec<BackendConfig>, mode: ExecutionMode) -> SwitchyardConfig {
    let ids: Vec<String> = backends.iter().map(|b| b.id.clone()).collect();
    let mut config = SwitchyardConfig::default();
    config.engine.mode = mode;
    config.breaker.timeout_ms = 2_000;
    config.backends = backends;
    config.tiers.simple = ids.clone();
    config.tiers.medium = ids.clone();
    config.tiers.complex = ids;
    config
}

pub fn orchestrator(config: &SwitchyardConfig) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::from_config(config).expect("orchestrator builds"))
}

/// Router over a fresh orchestrator for `config`.
pub fn app(config: SwitchyardConfig) -> (axum::Router, Arc<Orchestrator>) {
    let orchestrator = orchestrator(&config);
    let state = Arc::new(AppState::new(Arc::clone(&orchestrator), Arc::new(config)));
    (create_router(state), orchestrator)
}
