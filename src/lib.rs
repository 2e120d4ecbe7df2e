//! Switchyard - tier-aware LLM gateway
//!
//! Classifies each chat request into a complexity tier, then answers it from
//! a response cache or from the healthiest backends of that tier, guarding
//! every call with a per-backend circuit breaker and falling back (or racing)
//! across candidates.

pub mod agent;
pub mod api;
pub mod breaker;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod health;
pub mod logging;
pub mod metrics;
