//! Per-backend circuit breakers.
//!
//! A [`CircuitBreaker`] guards calls to one backend with a timeout and a
//! consecutive-failure threshold:
//!
//! ```text
//! CLOSED --(failures >= threshold)--> OPEN --(reset timeout elapsed)--> HALF_OPEN
//!    ^                                  ^                                   |
//!    |                                  +-----------(trial fails)-----------+
//!    +------------------------------(trial succeeds)------------------------+
//! ```
//!
//! `HALF_OPEN` admits a single trial call; concurrent callers are rejected
//! as if the breaker were still open. The breaker never retries or falls
//! back on its own.

mod error;

pub use error::BreakerError;

use crate::config::{BreakerSettings, SwitchyardConfig};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Admission mode of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable view of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    /// Earliest instant an OPEN breaker admits a trial
    retry_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            retry_at: None,
            trial_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Clears the trial slot if a half-open call is dropped before completing.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

/// Admission-control state machine for a single backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    backend_id: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(backend_id: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            backend_id: backend_id.into(),
            settings,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current mode. An OPEN breaker whose cool-down has elapsed still reports
    /// OPEN until the next call moves it to HALF_OPEN.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.settings.failure_threshold,
        }
    }

    /// Return to CLOSED with a zero failure count.
    pub fn reset(&self) {
        *self.lock() = BreakerInner::new();
    }

    fn admit(&self) -> Option<Admission> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Some(Admission::Normal),
            BreakerState::Open => {
                let now = Instant::now();
                match inner.retry_at {
                    Some(retry_at) if now < retry_at => None,
                    _ => {
                        inner.state = BreakerState::HalfOpen;
                        inner.trial_in_flight = true;
                        tracing::info!(backend = %self.backend_id, "Circuit breaker half-open");
                        Some(Admission::Trial)
                    }
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Admission::Trial)
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if admission == Admission::Trial {
            inner.trial_in_flight = false;
        }
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Closed;
            inner.retry_at = None;
            tracing::info!(backend = %self.backend_id, "Circuit breaker closed");
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if admission == Admission::Trial {
            inner.trial_in_flight = false;
        }

        let should_open = match inner.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => inner.consecutive_failures >= self.settings.failure_threshold,
            // A straggler admitted before the breaker opened must not extend the cool-down
            BreakerState::Open => false,
        };

        if should_open {
            inner.state = BreakerState::Open;
            inner.retry_at = Some(Instant::now() + self.settings.reset_timeout);
            tracing::warn!(
                backend = %self.backend_id,
                consecutive_failures = inner.consecutive_failures,
                reset_timeout_ms = self.settings.reset_timeout.as_millis() as u64,
                "Circuit breaker opened"
            );
        }
    }

    /// Run `call` under the breaker's timeout.
    ///
    /// Returns [`BreakerError::Open`] without invoking `call` when the breaker
    /// is rejecting. A timeout counts as a failure even if the call would have
    /// eventually succeeded.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_within(self.settings.timeout, call).await
    }

    /// [`execute`](Self::execute) with the timeout capped at `limit`.
    ///
    /// Used to keep an attempt inside the caller's remaining request budget.
    /// Hitting the cap is a timeout like any other.
    pub async fn execute_within<F, Fut, T, E>(
        &self,
        limit: Duration,
        call: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let timeout = self.settings.timeout.min(limit);
        let admission = self.admit().ok_or(BreakerError::Open)?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = tokio::time::timeout(timeout, call()).await;
        guard.armed = false;

        match result {
            Ok(Ok(value)) => {
                self.on_success(admission);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.on_failure(admission);
                Err(BreakerError::Failed(e))
            }
            Err(_) => {
                self.on_failure(admission);
                Err(BreakerError::Timeout(timeout))
            }
        }
    }
}

/// Exactly one breaker per backend id for the life of the set.
#[derive(Debug)]
pub struct BreakerSet {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: BreakerSettings,
}

impl BreakerSet {
    pub fn new(defaults: BreakerSettings) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
        }
    }

    /// One breaker per configured backend, with per-backend overrides applied.
    pub fn from_config(config: &SwitchyardConfig) -> Self {
        let set = Self::new(config.breaker.clone().into());
        for backend in &config.backends {
            set.register(&backend.id, config.breaker.resolve(backend));
        }
        set
    }

    /// Return the existing breaker for `id`, or create it with `settings`.
    pub fn register(&self, id: &str, settings: BreakerSettings) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(id, settings)))
            .clone()
    }

    /// Breaker for `id`, created with the default settings on first use.
    pub fn breaker(&self, id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(id) {
            return Arc::clone(existing.value());
        }
        self.register(id, self.defaults)
    }

    pub fn get(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(id).map(|b| Arc::clone(b.value()))
    }

    pub fn state(&self, id: &str) -> Option<BreakerState> {
        self.breakers.get(id).map(|b| b.state())
    }

    /// Backend id → mode, sorted by id.
    pub fn states(&self) -> BTreeMap<String, BreakerState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    pub fn snapshots(&self) -> BTreeMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Close every breaker. Instances are kept.
    pub fn reset(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
