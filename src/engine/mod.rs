//! Orchestration engine.
//!
//! [`Orchestrator::handle`] ties the other components together:
//!
//! 1. classify the request text into a [`Tier`]
//! 2. answer from the [`ResponseCache`] when possible
//! 3. order the tier's backends by health (or use the forced override)
//! 4. run the candidates sequentially or as a race, each through its breaker
//! 5. record every attempt in the health registry and metrics, and cache the winner
//!
//! In parallel mode the losers keep running on a [`TaskTracker`] after the
//! caller has its answer so their outcomes still reach the breakers and the
//! registry. [`Orchestrator::drain`] waits for them.

mod error;
mod types;

pub use error::{AttemptError, BackendFailure, EngineError};
pub use types::{
    AttemptOutcome, CachedReply, ChatRequest, ExecutionAttempt, OrchestrationResult,
};

use crate::agent::http::default_client;
use crate::agent::{build_agents, AgentError, AgentMap, Completion, InferenceAgent, Turn};
use crate::breaker::{BreakerSet, BreakerState, CircuitBreaker};
use crate::cache::{cache_key, CacheStats, ResponseCache};
use crate::classifier::{Tier, TierPolicy};
use crate::config::{ExecutionMode, SwitchyardConfig, TierTable};
use crate::health::{HealthRegistry, HealthScore};
use crate::logging::{generate_request_id, preview};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Result of one attempt plus its caller-visible record.
struct AttemptReport {
    attempt: ExecutionAttempt,
    result: Result<Completion, AttemptError>,
}

/// Everything an attempt needs, cloneable into a spawned task.
#[derive(Clone)]
struct AttemptRunner {
    turns: Arc<[Turn]>,
    health: Arc<HealthRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl AttemptRunner {
    /// Run one attempt. With a `deadline` the attempt is cut off there even
    /// when the breaker's own timeout is longer.
    async fn run(
        &self,
        position: usize,
        agent: Arc<dyn InferenceAgent>,
        breaker: Arc<CircuitBreaker>,
        deadline: Option<Instant>,
    ) -> AttemptReport {
        let backend_id = agent.id().to_string();
        let started = Instant::now();
        let call = || agent.complete(&self.turns);
        let result = match deadline {
            Some(deadline) => {
                breaker
                    .execute_within(deadline.saturating_duration_since(started), call)
                    .await
            }
            None => breaker.execute(call).await,
        }
        .map_err(AttemptError::from);
        let latency = started.elapsed();

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(e) => e.outcome(),
        };
        self.health.record_execution(&backend_id, outcome, latency);
        self.metrics.record_attempt(&backend_id, outcome);

        let latency_ms = latency.as_millis() as u64;
        match &result {
            Ok(_) => tracing::debug!(
                backend = %backend_id,
                position,
                latency_ms,
                "Attempt succeeded"
            ),
            Err(e) => {
                tracing::warn!(
                    backend = %backend_id,
                    position,
                    latency_ms,
                    kind = e.kind(),
                    error = %e,
                    "Attempt failed"
                );
                self.metrics
                    .record_error(Some(&backend_id), e.kind(), &e.to_string());
            }
        }

        AttemptReport {
            attempt: ExecutionAttempt {
                position,
                backend_id,
                outcome,
                latency_ms,
                error: result.as_ref().err().map(ToString::to_string),
            },
            result,
        }
    }
}

/// Successful candidate run, before it becomes an [`OrchestrationResult`].
struct Winner {
    backend_id: String,
    completion: Completion,
    attempts: Vec<ExecutionAttempt>,
}

/// Process-wide orchestration state: one instance per process, shared by
/// every request.
pub struct Orchestrator {
    policy: TierPolicy,
    tiers: TierTable,
    agents: AgentMap,
    breakers: Arc<BreakerSet>,
    health: Arc<HealthRegistry>,
    cache: ResponseCache<CachedReply>,
    metrics: Arc<MetricsCollector>,
    tracker: TaskTracker,
    mode: ExecutionMode,
    deadline: Duration,
    cache_enabled: bool,
    content_logging: bool,
}

impl Orchestrator {
    /// Build from configuration and a ready agent map.
    ///
    /// Fails with [`EngineError::InvalidConfiguration`] when a tier names a
    /// backend that has no agent.
    pub fn new(config: &SwitchyardConfig, agents: AgentMap) -> Result<Self, EngineError> {
        for (tier, backend_id) in config.tiers.entries() {
            if !agents.contains_key(backend_id) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "tier '{}' references backend '{}' which has no agent",
                    tier, backend_id
                )));
            }
        }

        let breakers = Arc::new(BreakerSet::from_config(config));
        let health = Arc::new(HealthRegistry::from_config(config, Arc::clone(&breakers)));

        Ok(Self {
            policy: TierPolicy::from_config(&config.classifier),
            tiers: config.tiers.clone(),
            agents,
            breakers,
            health,
            cache: ResponseCache::new(config.cache.ttl(), config.cache.capacity),
            metrics: Arc::new(MetricsCollector::new()),
            tracker: TaskTracker::new(),
            mode: config.engine.mode,
            deadline: config.engine.request_deadline(),
            cache_enabled: config.cache.enabled,
            content_logging: config.logging.enable_content_logging,
        })
    }

    /// Build with HTTP agents for every configured backend.
    ///
    /// A missing credential is reported as
    /// [`EngineError::InvalidConfiguration`].
    pub fn from_config(config: &SwitchyardConfig) -> Result<Self, EngineError> {
        let client = default_client().map_err(configuration_error)?;
        let agents = build_agents(config, Arc::new(client)).map_err(configuration_error)?;
        Self::new(config, agents)
    }

    /// Use `metrics` instead of the private collector (e.g. one that can
    /// render Prometheus text).
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn breakers(&self) -> &Arc<BreakerSet> {
        &self.breakers
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// Answer one request.
    pub async fn handle(&self, request: ChatRequest) -> Result<OrchestrationResult, EngineError> {
        let request_id = generate_request_id();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            tier = tracing::field::Empty
        );
        self.process(request, request_id).instrument(span).await
    }

    async fn process(
        &self,
        request: ChatRequest,
        request_id: String,
    ) -> Result<OrchestrationResult, EngineError> {
        let started = Instant::now();
        let deadline = started + self.deadline;

        let (analysis, decision) = self.policy.classify(&request.text);
        let tier = decision.tier;
        tracing::Span::current().record("tier", tier.as_str());
        tracing::debug!(
            reason = %decision.reason,
            confidence = decision.confidence,
            score = analysis.score,
            words = analysis.word_count,
            "Tier selected"
        );
        if self.content_logging {
            tracing::debug!(prompt = %preview(&request.text), "Request content");
        }

        if let Some(id) = &request.backend {
            if !self.agents.contains_key(id) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "unknown backend '{}'",
                    id
                )));
            }
        }

        let key = cache_key(&request.history, &request.text, request.backend.as_deref());
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                let elapsed = started.elapsed();
                self.metrics.record_cache_hit(tier, elapsed);
                let stats = self.cache.stats();
                tracing::debug!(
                    backend = %cached.backend_id,
                    hits = stats.hits,
                    misses = stats.misses,
                    size = stats.size,
                    "Served from cache"
                );
                return Ok(OrchestrationResult {
                    request_id,
                    text: cached.text,
                    backend_id: cached.backend_id,
                    tier,
                    reason: decision.reason,
                    confidence: decision.confidence,
                    analysis,
                    served_from_cache: true,
                    attempts: Vec::new(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    usage: cached.usage,
                });
            }
        }

        let candidates = match &request.backend {
            Some(id) => vec![id.clone()],
            None => self.candidates(tier),
        };
        if candidates.is_empty() {
            return Err(EngineError::InvalidConfiguration(format!(
                "no backends configured for tier '{}'",
                tier
            )));
        }
        tracing::debug!(?candidates, mode = ?self.mode, "Executing candidates");

        let runner = AttemptRunner {
            turns: request.turns().into(),
            health: Arc::clone(&self.health),
            metrics: Arc::clone(&self.metrics),
        };
        let outcome = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(&runner, &candidates, deadline).await,
            ExecutionMode::Parallel => self.run_parallel(&runner, &candidates, deadline).await,
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(winner) => {
                self.metrics.record_success(tier, &winner.backend_id, elapsed);
                if self.cache_enabled {
                    self.cache.set(
                        key,
                        CachedReply {
                            text: winner.completion.text.clone(),
                            backend_id: winner.backend_id.clone(),
                            usage: winner.completion.usage,
                        },
                    );
                }
                tracing::info!(
                    backend = %winner.backend_id,
                    attempts = winner.attempts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
                Ok(OrchestrationResult {
                    request_id,
                    text: winner.completion.text,
                    backend_id: winner.backend_id,
                    tier,
                    reason: decision.reason,
                    confidence: decision.confidence,
                    analysis,
                    served_from_cache: false,
                    attempts: winner.attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                    usage: winner.completion.usage,
                })
            }
            Err(err) => {
                self.metrics.record_failure(tier, elapsed, &err.to_string());
                tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Request failed"
                );
                Err(err)
            }
        }
    }

    /// Tier backends by health, then fallback backends by health.
    fn candidates(&self, tier: Tier) -> Vec<String> {
        let mut ordered = self.health.order_by_health(self.tiers.backends_for(tier));
        if tier != Tier::Fallback {
            for id in self
                .health
                .order_by_health(self.tiers.backends_for(Tier::Fallback))
            {
                if !ordered.contains(&id) {
                    ordered.push(id);
                }
            }
        }
        ordered
    }

    fn resolve(&self, backend_id: &str) -> Option<(Arc<dyn InferenceAgent>, Arc<CircuitBreaker>)> {
        let agent = self.agents.get(backend_id)?;
        Some((Arc::clone(agent), self.breakers.breaker(backend_id)))
    }

    async fn run_sequential(
        &self,
        runner: &AttemptRunner,
        candidates: &[String],
        deadline: Instant,
    ) -> Result<Winner, EngineError> {
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();

        for (position, backend_id) in candidates.iter().enumerate() {
            // The first candidate always gets a try; later ones only while budget remains
            if position > 0 && Instant::now() >= deadline {
                tracing::warn!(remaining = candidates.len() - position, "Request deadline passed");
                break;
            }
            let Some((agent, breaker)) = self.resolve(backend_id) else {
                continue;
            };

            let report = runner.run(position, agent, breaker, Some(deadline)).await;
            attempts.push(report.attempt);
            match report.result {
                Ok(completion) => {
                    return Ok(Winner {
                        backend_id: backend_id.clone(),
                        completion,
                        attempts,
                    })
                }
                Err(error) => failures.push(BackendFailure {
                    backend_id: backend_id.clone(),
                    error,
                }),
            }
        }

        Err(EngineError::AllCandidatesFailed { attempts, failures })
    }

    async fn run_parallel(
        &self,
        runner: &AttemptRunner,
        candidates: &[String],
        deadline: Instant,
    ) -> Result<Winner, EngineError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<AttemptReport>();

        for (position, backend_id) in candidates.iter().enumerate() {
            let Some((agent, breaker)) = self.resolve(backend_id) else {
                continue;
            };
            let runner = runner.clone();
            let tx = tx.clone();
            self.tracker.spawn(
                async move {
                    // Losers may finish after the deadline; their outcomes still count
                    let report = runner.run(position, agent, breaker, None).await;
                    // The receiver is gone once a winner was picked
                    let _ = tx.send(report);
                }
                .in_current_span(),
            );
        }
        drop(tx);

        let mut attempts = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();
        let mut winner = None;

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(report)) => {
                    let backend_id = report.attempt.backend_id.clone();
                    attempts.push(report.attempt);
                    match report.result {
                        Ok(completion) => {
                            winner = Some((backend_id, completion));
                            break;
                        }
                        Err(error) => failures.push(BackendFailure { backend_id, error }),
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        completed = attempts.len(),
                        "Request deadline passed before a winner"
                    );
                    break;
                }
            }
        }
        attempts.sort_by_key(|a| a.position);

        match winner {
            Some((backend_id, completion)) => Ok(Winner {
                backend_id,
                completion,
                attempts,
            }),
            None => Err(EngineError::AllCandidatesFailed { attempts, failures }),
        }
    }

    /// Wait for every background attempt to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Attempts still running in the background.
    pub fn pending_attempts(&self) -> usize {
        self.tracker.len()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn breaker_states(&self) -> BTreeMap<String, BreakerState> {
        self.breakers.states()
    }

    pub fn health_report(&self) -> Vec<HealthScore> {
        self.health.report()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached reply and zero the cache counters.
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Response cache cleared");
    }

    /// Zero the request metrics and every backend's health stats.
    /// Breaker states are left alone.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
        self.health.reset();
    }
}

fn configuration_error(err: AgentError) -> EngineError {
    EngineError::InvalidConfiguration(err.to_string())
}

#[cfg(test)]
mod tests;
