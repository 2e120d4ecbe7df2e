//! Unit tests for the orchestrator, driven by scripted in-process agents.

use super::*;
use crate::agent::Usage;
use crate::config::{BackendConfig, Protocol};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum Script {
    Reply(&'static str),
    Fail,
    /// Reply after the given delay
    Slow(Duration, &'static str),
}

struct ScriptedAgent {
    id: String,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn new(id: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceAgent for ScriptedAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn protocol(&self) -> Protocol {
        Protocol::Chat
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Completion, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = match &self.script {
            Script::Reply(text) => *text,
            Script::Fail => {
                return Err(AgentError::Upstream {
                    status: 500,
                    message: format!("{} is down", self.id),
                })
            }
            Script::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                *text
            }
        };
        Ok(Completion {
            text: format!("{} (turns: {})", reply, turns.len()),
            usage: Some(Usage {
                input_tokens: 3,
                output_tokens: 5,
                total_tokens: 8,
            }),
        })
    }
}

/// Config where every tier holds `ids` in order and there is no fallback.
fn config(ids: &[&str], mode: ExecutionMode) -> SwitchyardConfig {
    let mut config = SwitchyardConfig::default();
    config.engine.mode = mode;
    config.breaker.timeout_ms = 1_000;
    for id in ids {
        config
            .backends
            .push(BackendConfig::new(id, Protocol::Chat, "http://localhost", "m"));
    }
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    config.tiers.simple = ids.clone();
    config.tiers.medium = ids.clone();
    config.tiers.complex = ids;
    config
}

fn agents(list: &[Arc<ScriptedAgent>]) -> AgentMap {
    list.iter()
        .map(|agent| {
            let dyn_agent: Arc<dyn InferenceAgent> = Arc::clone(agent) as Arc<dyn InferenceAgent>;
            (agent.id.clone(), dyn_agent)
        })
        .collect()
}

fn outcomes(attempts: &[ExecutionAttempt]) -> Vec<(usize, &str, AttemptOutcome)> {
    attempts
        .iter()
        .map(|a| (a.position, a.backend_id.as_str(), a.outcome))
        .collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_rejects_tier_without_agent() {
    let config = config(&["a", "b"], ExecutionMode::Sequential);
    let a = ScriptedAgent::new("a", Script::Reply("hi"));

    let err = Orchestrator::new(&config, agents(&[a])).err().unwrap();
    assert!(matches!(err, EngineError::InvalidConfiguration(msg) if msg.contains("'b'")));
}

#[test]
fn test_from_config_missing_credential_is_invalid_configuration() {
    let mut config = config(&["a"], ExecutionMode::Sequential);
    config.backends[0].api_key_env = Some("SWITCHYARD_TEST_ENGINE_UNSET_KEY".to_string());

    let err = Orchestrator::from_config(&config).err().unwrap();
    assert_eq!(err.kind(), "invalid_configuration");
}

// ============================================================================
// Sequential
// ============================================================================

#[tokio::test]
async fn test_sequential_falls_back_to_next_candidate() {
    let a = ScriptedAgent::new("a", Script::Fail);
    let b = ScriptedAgent::new("b", Script::Reply("from b"));
    let orchestrator = Orchestrator::new(
        &config(&["a", "b"], ExecutionMode::Sequential),
        agents(&[a.clone(), b.clone()]),
    )
    .unwrap();

    let result = orchestrator.handle(ChatRequest::new("Olá, tudo bem?")).await.unwrap();

    assert_eq!(result.backend_id, "b");
    assert_eq!(result.tier, Tier::Simple);
    assert!(!result.served_from_cache);
    assert_eq!(result.text, "from b (turns: 1)");
    assert_eq!(
        outcomes(&result.attempts),
        vec![(0, "a", AttemptOutcome::Failure), (1, "b", AttemptOutcome::Success)]
    );
    assert!(result.attempts[0].error.as_deref().unwrap().contains("a is down"));
}

#[tokio::test]
async fn test_sequential_stops_at_first_success() {
    let a = ScriptedAgent::new("a", Script::Reply("from a"));
    let b = ScriptedAgent::new("b", Script::Reply("from b"));
    let orchestrator = Orchestrator::new(
        &config(&["a", "b"], ExecutionMode::Sequential),
        agents(&[a.clone(), b.clone()]),
    )
    .unwrap();

    let result = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert_eq!(result.backend_id, "a");
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_exhaustion_lists_every_attempt_in_order() {
    let list = [
        ScriptedAgent::new("a", Script::Fail),
        ScriptedAgent::new("b", Script::Fail),
        ScriptedAgent::new("c", Script::Fail),
    ];
    let orchestrator = Orchestrator::new(
        &config(&["a", "b", "c"], ExecutionMode::Sequential),
        agents(&list),
    )
    .unwrap();

    let err = orchestrator.handle(ChatRequest::new("hi")).await.unwrap_err();

    match err {
        EngineError::AllCandidatesFailed { attempts, failures } => {
            assert_eq!(
                outcomes(&attempts),
                vec![
                    (0, "a", AttemptOutcome::Failure),
                    (1, "b", AttemptOutcome::Failure),
                    (2, "c", AttemptOutcome::Failure),
                ]
            );
            let ids: Vec<_> = failures.iter().map(|f| f.backend_id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b", "c"]);
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }

    let snapshot = orchestrator.metrics_snapshot();
    assert_eq!(snapshot.requests.failed, 1);
    assert_eq!(snapshot.recent_errors.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out_and_falls_back() {
    let slow = ScriptedAgent::new("slow", Script::Slow(Duration::from_secs(5), "late"));
    let fast = ScriptedAgent::new("fast", Script::Reply("on time"));
    let orchestrator = Orchestrator::new(
        &config(&["slow", "fast"], ExecutionMode::Sequential),
        agents(&[slow, fast]),
    )
    .unwrap();

    let result = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert_eq!(result.backend_id, "fast");
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Timeout);
    assert_eq!(result.attempts[0].latency_ms, 1_000);
    assert_eq!(orchestrator.health().stats("slow").unwrap().timeout, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_stops_advancing_after_deadline() {
    let mut config = config(&["a", "b"], ExecutionMode::Sequential);
    config.engine.request_deadline_ms = 500;
    let a = ScriptedAgent::new("a", Script::Slow(Duration::from_secs(5), "late"));
    let b = ScriptedAgent::new("b", Script::Reply("never"));
    let orchestrator = Orchestrator::new(&config, agents(&[a, b.clone()])).unwrap();

    let err = orchestrator.handle(ChatRequest::new("hi")).await.unwrap_err();

    match err {
        EngineError::AllCandidatesFailed { attempts, .. } => {
            assert_eq!(outcomes(&attempts), vec![(0, "a", AttemptOutcome::Timeout)]);
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
    assert_eq!(b.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_attempts_are_cut_at_request_deadline() {
    let mut config = config(&["a", "b"], ExecutionMode::Sequential);
    config.breaker.timeout_ms = 6_000;
    config.engine.request_deadline_ms = 10_000;
    let a = ScriptedAgent::new("a", Script::Slow(Duration::from_secs(7), "late"));
    let b = ScriptedAgent::new("b", Script::Slow(Duration::from_secs(7), "late"));
    let orchestrator = Orchestrator::new(&config, agents(&[a, b.clone()])).unwrap();

    let started = Instant::now();
    let err = orchestrator.handle(ChatRequest::new("hi")).await.unwrap_err();

    assert!(started.elapsed() <= Duration::from_secs(10));
    match err {
        EngineError::AllCandidatesFailed { attempts, .. } => {
            let timings: Vec<_> = attempts
                .iter()
                .map(|a| (a.position, a.outcome, a.latency_ms))
                .collect();
            assert_eq!(
                timings,
                vec![
                    (0, AttemptOutcome::Timeout, 6_000),
                    (1, AttemptOutcome::Timeout, 4_000),
                ]
            );
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
    assert_eq!(b.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_fallback_succeeds_inside_remaining_budget() {
    let mut config = config(&["a", "b"], ExecutionMode::Sequential);
    config.breaker.timeout_ms = 6_000;
    config.engine.request_deadline_ms = 10_000;
    let a = ScriptedAgent::new("a", Script::Slow(Duration::from_secs(7), "late"));
    let b = ScriptedAgent::new("b", Script::Slow(Duration::from_secs(3), "made it"));
    let orchestrator = Orchestrator::new(&config, agents(&[a, b])).unwrap();

    let started = Instant::now();
    let result = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(9));
    assert_eq!(result.backend_id, "b");
    assert_eq!(result.text, "made it (turns: 1)");
}

// ============================================================================
// Breakers
// ============================================================================

#[tokio::test]
async fn test_open_breaker_rejects_without_calling_backend() {
    let mut config = config(&["a", "b"], ExecutionMode::Sequential);
    config.breaker.failure_threshold = 1;
    let a = ScriptedAgent::new("a", Script::Fail);
    let b = ScriptedAgent::new("b", Script::Reply("ok"));
    let orchestrator = Orchestrator::new(&config, agents(&[a.clone(), b])).unwrap();

    let first = orchestrator.handle(ChatRequest::new("first")).await.unwrap();
    assert_eq!(first.backend_id, "b");
    assert_eq!(orchestrator.breaker_states().get("a"), Some(&BreakerState::Open));

    let err = orchestrator
        .handle(ChatRequest::new("second").with_backend("a"))
        .await
        .unwrap_err();

    match err {
        EngineError::AllCandidatesFailed { attempts, failures } => {
            assert_eq!(outcomes(&attempts), vec![(0, "a", AttemptOutcome::Rejected)]);
            assert_eq!(failures[0].error.kind(), "breaker_open");
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
    assert_eq!(a.calls(), 1);
    assert_eq!(orchestrator.health().stats("a").unwrap().rejected, 1);
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_identical_request_served_from_cache() {
    let a = ScriptedAgent::new("a", Script::Reply("cached"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a.clone()]))
            .unwrap();

    let first = orchestrator.handle(ChatRequest::new("Olá, tudo bem?")).await.unwrap();
    let second = orchestrator.handle(ChatRequest::new("Olá,  tudo bem?")).await.unwrap();

    assert!(!first.served_from_cache);
    assert!(second.served_from_cache);
    assert!(second.attempts.is_empty());
    assert_eq!(second.text, first.text);
    assert_eq!(second.backend_id, "a");
    assert_eq!(a.calls(), 1);
    assert_eq!(orchestrator.metrics_snapshot().requests.cache_hits, 1);
}

#[tokio::test]
async fn test_clear_cache_forces_new_attempt() {
    let a = ScriptedAgent::new("a", Script::Reply("fresh"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a.clone()]))
            .unwrap();

    orchestrator.handle(ChatRequest::new("hi")).await.unwrap();
    orchestrator.clear_cache();
    let again = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert!(!again.served_from_cache);
    assert_eq!(a.calls(), 2);
    assert_eq!(orchestrator.cache_stats().hits, 0);
}

#[tokio::test]
async fn test_disabled_cache_never_hits() {
    let mut config = config(&["a"], ExecutionMode::Sequential);
    config.cache.enabled = false;
    let a = ScriptedAgent::new("a", Script::Reply("x"));
    let orchestrator = Orchestrator::new(&config, agents(&[a.clone()])).unwrap();

    orchestrator.handle(ChatRequest::new("hi")).await.unwrap();
    let second = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert!(!second.served_from_cache);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_history_changes_cache_key() {
    let a = ScriptedAgent::new("a", Script::Reply("x"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a.clone()]))
            .unwrap();

    orchestrator.handle(ChatRequest::new("and then?")).await.unwrap();
    let with_history = ChatRequest::new("and then?")
        .with_history(vec![Turn::user("tell me a story"), Turn::assistant("once upon")]);
    let result = orchestrator.handle(with_history).await.unwrap();

    assert!(!result.served_from_cache);
    assert_eq!(result.text, "x (turns: 3)");
}

// ============================================================================
// Candidates and overrides
// ============================================================================

#[tokio::test]
async fn test_override_uses_single_backend() {
    let a = ScriptedAgent::new("a", Script::Reply("from a"));
    let b = ScriptedAgent::new("b", Script::Fail);
    let orchestrator = Orchestrator::new(
        &config(&["a", "b"], ExecutionMode::Sequential),
        agents(&[a.clone(), b]),
    )
    .unwrap();

    let err = orchestrator
        .handle(ChatRequest::new("hi").with_backend("b"))
        .await
        .unwrap_err();

    match err {
        EngineError::AllCandidatesFailed { attempts, .. } => assert_eq!(attempts.len(), 1),
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_unknown_override_is_invalid_configuration() {
    let a = ScriptedAgent::new("a", Script::Reply("x"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a.clone()]))
            .unwrap();

    let err = orchestrator
        .handle(ChatRequest::new("hi").with_backend("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidConfiguration(msg) if msg.contains("ghost")));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_fallback_tier_appended_after_tier_candidates() {
    let mut config = config(&["primary"], ExecutionMode::Sequential);
    config
        .backends
        .push(BackendConfig::new("spare", Protocol::Turn, "http://localhost", "m"));
    config.tiers.fallback = vec!["spare".to_string(), "primary".to_string()];
    let primary = ScriptedAgent::new("primary", Script::Fail);
    let spare = ScriptedAgent::new("spare", Script::Reply("spare"));
    let orchestrator = Orchestrator::new(&config, agents(&[primary, spare])).unwrap();

    let result = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert_eq!(
        outcomes(&result.attempts),
        vec![
            (0, "primary", AttemptOutcome::Failure),
            (1, "spare", AttemptOutcome::Success),
        ]
    );
}

#[tokio::test]
async fn test_empty_tier_is_invalid_configuration() {
    let mut config = config(&["a"], ExecutionMode::Sequential);
    config.tiers.complex.clear();
    let orchestrator =
        Orchestrator::new(&config, agents(&[ScriptedAgent::new("a", Script::Reply("x"))]))
            .unwrap();

    let err = orchestrator
        .handle(ChatRequest::new("```rust\nfn main() {}\n```"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidConfiguration(msg) if msg.contains("complex")));
}

// ============================================================================
// Parallel
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_parallel_first_success_wins_and_losers_finish_in_background() {
    let slow = ScriptedAgent::new("slow", Script::Slow(Duration::from_millis(500), "slow"));
    let fast = ScriptedAgent::new("fast", Script::Slow(Duration::from_millis(50), "fast"));
    let orchestrator = Orchestrator::new(
        &config(&["slow", "fast"], ExecutionMode::Parallel),
        agents(&[slow.clone(), fast.clone()]),
    )
    .unwrap();

    let result = orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    assert_eq!(result.backend_id, "fast");
    assert_eq!(outcomes(&result.attempts), vec![(1, "fast", AttemptOutcome::Success)]);
    assert_eq!(orchestrator.health().stats("slow").unwrap().total, 0);

    orchestrator.drain().await;

    assert_eq!(orchestrator.pending_attempts(), 0);
    assert_eq!(orchestrator.health().stats("slow").unwrap().success, 1);
    assert_eq!(slow.calls(), 1);
    let usage = orchestrator.metrics_snapshot().backends;
    assert_eq!(usage.iter().map(|u| u.success).sum::<u64>(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_exhaustion_sorted_by_position() {
    let list = [
        ScriptedAgent::new("a", Script::Slow(Duration::from_secs(2), "late")),
        ScriptedAgent::new("b", Script::Fail),
    ];
    let orchestrator = Orchestrator::new(
        &config(&["a", "b"], ExecutionMode::Parallel),
        agents(&list),
    )
    .unwrap();

    let err = orchestrator.handle(ChatRequest::new("hi")).await.unwrap_err();

    match err {
        EngineError::AllCandidatesFailed { attempts, failures } => {
            assert_eq!(
                outcomes(&attempts),
                vec![(0, "a", AttemptOutcome::Timeout), (1, "b", AttemptOutcome::Failure)]
            );
            assert_eq!(failures.len(), 2);
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_parallel_deadline_returns_before_slow_candidates() {
    let mut config = config(&["a"], ExecutionMode::Parallel);
    config.engine.request_deadline_ms = 200;
    let a = ScriptedAgent::new("a", Script::Slow(Duration::from_millis(800), "late"));
    let orchestrator = Orchestrator::new(&config, agents(&[a])).unwrap();

    let err = orchestrator.handle(ChatRequest::new("hi")).await.unwrap_err();

    match &err {
        EngineError::AllCandidatesFailed { attempts, failures } => {
            assert!(attempts.is_empty());
            assert!(failures.is_empty());
        }
        other => panic!("expected AllCandidatesFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("deadline"));

    orchestrator.drain().await;
    assert_eq!(orchestrator.health().stats("a").unwrap().success, 1);
}

// ============================================================================
// Introspection
// ============================================================================

#[tokio::test]
async fn test_reset_metrics_clears_metrics_and_health() {
    let a = ScriptedAgent::new("a", Script::Reply("x"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a])).unwrap();
    orchestrator.handle(ChatRequest::new("hi")).await.unwrap();

    orchestrator.reset_metrics();

    assert_eq!(orchestrator.metrics_snapshot().requests.total, 0);
    assert_eq!(orchestrator.health().stats("a").unwrap().total, 0);
    assert_eq!(orchestrator.health_report().len(), 1);
}

#[tokio::test]
async fn test_result_carries_decision_and_usage() {
    let a = ScriptedAgent::new("a", Script::Reply("x"));
    let orchestrator =
        Orchestrator::new(&config(&["a"], ExecutionMode::Sequential), agents(&[a])).unwrap();

    let result = orchestrator
        .handle(ChatRequest::new("```python\nprint('hi')\n```"))
        .await
        .unwrap();

    assert_eq!(result.tier, Tier::Complex);
    assert!(result.analysis.has_code);
    assert_eq!(result.reason, "contains code");
    assert_eq!(result.usage.map(|u| u.total_tokens), Some(8));
    assert_eq!(result.request_id.len(), 36);
}
