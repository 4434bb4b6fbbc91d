//! Circuit breaker guarding a single upstream action.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, the fallback is returned without calling it
//! - Half-Open: probing whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold (consecutive, any success resets)
//! Open → Half-Open: first call at or after next_attempt, or the deferred
//!                   timer at cooldown + grace when no traffic arrives
//! Half-Open → Closed: SUCCESS_THRESHOLD consecutive probe successes
//! Half-Open → Open: a probe failure pushes failure_count to threshold
//! ```
//!
//! # Design Decisions
//! - One breaker per guarded action (not pooled)
//! - All read-decide-write blocks run under one mutex, never across an await
//! - Each attempt runs on its own task: dropping a pending `fire()` does not
//!   cancel the attempt, and its outcome is applied exactly once
//! - Entering Open bumps an epoch; the deferred Half-Open timer only acts on
//!   the epoch that scheduled it
//! - failure_count is carried into Half-Open, so a single probe failure can
//!   reopen the circuit

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::stats::BreakerStats;
use crate::resilience::timeouts::run_with_timeout;

/// Consecutive Half-Open successes needed to close the circuit.
pub const SUCCESS_THRESHOLD: u32 = 2;

/// Extra delay after the cooldown before the deferred Half-Open timer fires.
pub const HALF_OPEN_GRACE: Duration = Duration::from_millis(100);

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    #[serde(rename = "CLOSED")]
    Closed,
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "HALF-OPEN")]
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF-OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`CircuitBreaker::fire`] for an attempted call.
///
/// A call rejected while the circuit is Open is not an error: it yields the
/// fallback value.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The wrapped action failed.
    #[error("{0}")]
    Action(E),

    /// The wrapped action did not settle within the configured timeout.
    #[error("Timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The attempt never produced an outcome (panic or runtime shutdown).
    #[error("action aborted: {0}")]
    Aborted(String),
}

impl<E> BreakerError<E> {
    /// True for a deadline failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout(_))
    }
}

/// Construction-time configuration error. Fatal, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidConfiguration {
    #[error("circuit breaker `{0}` has no action to guard")]
    MissingAction(String),

    #[error("circuit breaker `{name}`: {field} must be positive")]
    NotPositive { name: String, field: &'static str },
}

/// The guarded call: produces a fresh future per attempt.
pub type Action<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Mutable breaker state. Only touched under [`Inner::core`].
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) state: CircuitState,
    pub(crate) failure_count: u32,
    pub(crate) success_count: u32,
    pub(crate) next_attempt: Instant,
    pub(crate) next_attempt_epoch_ms: u64,
    pub(crate) total_calls: u64,
    pub(crate) successful_calls: u64,
    pub(crate) last_error: Option<String>,
    pub(crate) open_epoch: u64,
    half_open_timer: Option<JoinHandle<()>>,
}

struct Inner<T, E> {
    name: String,
    threshold: u32,
    cooldown: Duration,
    timeout: Duration,
    fallback: T,
    action: Action<T, E>,
    core: Mutex<Core>,
}

/// Builder for [`CircuitBreaker`]. Validation happens in [`build`](Self::build).
pub struct CircuitBreakerBuilder<T, E> {
    name: String,
    fallback: T,
    action: Option<Action<T, E>>,
    threshold: u32,
    cooldown: Duration,
    timeout: Duration,
}

impl<T, E> CircuitBreakerBuilder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the action to guard. It is invoked once per admitted call.
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.action = Some(Arc::new(move || action().boxed()));
        self
    }

    /// Consecutive failures that trip the breaker.
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// How long an open circuit rejects calls before probing.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Upper bound on a single attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CircuitBreaker<T, E>, InvalidConfiguration> {
        let not_positive = |field| InvalidConfiguration::NotPositive {
            name: self.name.clone(),
            field,
        };
        if self.threshold == 0 {
            return Err(not_positive("threshold"));
        }
        if self.cooldown.is_zero() {
            return Err(not_positive("cooldown"));
        }
        if self.timeout.is_zero() {
            return Err(not_positive("timeout"));
        }
        let action = self
            .action
            .ok_or_else(|| InvalidConfiguration::MissingAction(self.name.clone()))?;

        tracing::info!(
            breaker = %self.name,
            threshold = self.threshold,
            cooldown_ms = saturating_millis(self.cooldown),
            timeout_ms = saturating_millis(self.timeout),
            "Circuit breaker created"
        );
        metrics::record_breaker_state(&self.name, CircuitState::Closed);

        Ok(CircuitBreaker {
            inner: Arc::new(Inner {
                threshold: self.threshold,
                cooldown: self.cooldown,
                timeout: self.timeout,
                fallback: self.fallback,
                action,
                core: Mutex::new(Core {
                    state: CircuitState::Closed,
                    failure_count: 0,
                    success_count: 0,
                    next_attempt: Instant::now(),
                    next_attempt_epoch_ms: epoch_millis(),
                    total_calls: 0,
                    successful_calls: 0,
                    last_error: None,
                    open_epoch: 0,
                    half_open_timer: None,
                }),
                name: self.name,
            }),
        })
    }
}

/// A circuit breaker around one asynchronous action.
///
/// Cloning yields another handle to the same breaker.
pub struct CircuitBreaker<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for CircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for CircuitBreaker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

impl<T, E> CircuitBreaker<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Start building a breaker that returns `fallback` while open.
    ///
    /// Defaults: name `default`, threshold 3, cooldown 10s, timeout 5s.
    pub fn builder(fallback: T) -> CircuitBreakerBuilder<T, E> {
        CircuitBreakerBuilder {
            name: "default".to_string(),
            fallback,
            action: None,
            threshold: 3,
            cooldown: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }

    /// Run the guarded action through the breaker.
    ///
    /// Returns the action's payload, or the fallback while the circuit is
    /// open. Failures of an attempted call (including timeouts) are counted
    /// and propagated.
    pub async fn fire(&self) -> Result<T, BreakerError<E>> {
        if !self.inner.admit() {
            metrics::record_breaker_call(&self.inner.name, "fallback");
            return Ok(self.inner.fallback.clone());
        }

        let inner = self.inner.clone();
        match tokio::spawn(inner.attempt()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(breaker = %self.inner.name, error = %e, "Attempt task did not complete");
                Err(BreakerError::Aborted(e.to_string()))
            }
        }
    }

    /// Point-in-time statistics. Never mutates the breaker.
    pub fn stats(&self) -> BreakerStats {
        let core = self.inner.lock();
        BreakerStats::capture(
            &self.inner.name,
            self.inner.threshold,
            self.inner.cooldown,
            &core,
            Instant::now(),
        )
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threshold(&self) -> u32 {
        self.inner.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn fallback(&self) -> &T {
        &self.inner.fallback
    }

    /// Number of open episodes so far.
    pub fn open_episodes(&self) -> u64 {
        self.inner.lock().open_epoch
    }
}

impl<T, E> Inner<T, E> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Count the call and decide whether it may reach the action.
    fn admit(&self) -> bool {
        let mut core = self.lock();
        core.total_calls += 1;

        if core.state != CircuitState::Open {
            return true;
        }
        if Instant::now() >= core.next_attempt {
            tracing::info!(breaker = %self.name, "Cooldown elapsed, probing upstream");
            if let Some(timer) = core.half_open_timer.take() {
                timer.abort();
            }
            self.set_state(&mut core, CircuitState::HalfOpen);
            return true;
        }

        tracing::debug!(
            breaker = %self.name,
            remaining_ms = saturating_millis(core.next_attempt.saturating_duration_since(Instant::now())),
            "Circuit open, using fallback"
        );
        false
    }

    async fn attempt(self: Arc<Self>) -> Result<T, BreakerError<E>> {
        let outcome = AssertUnwindSafe(async {
            run_with_timeout(self.timeout, (self.action)()).await
        })
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(Ok(value))) => {
                self.record_success();
                Ok(value)
            }
            Ok(Ok(Err(e))) => {
                let err = BreakerError::Action(e);
                self.record_failure(err.to_string());
                Err(err)
            }
            Ok(Err(elapsed)) => {
                let err = BreakerError::Timeout(elapsed.0);
                self.record_failure(err.to_string());
                Err(err)
            }
            Err(_) => {
                self.record_failure("action panicked".to_string());
                Err(BreakerError::Aborted("action panicked".to_string()))
            }
        }
    }

    fn record_success(&self) {
        metrics::record_breaker_call(&self.name, "success");
        let mut core = self.lock();
        core.successful_calls += 1;

        match core.state {
            CircuitState::HalfOpen => {
                core.success_count += 1;
                if core.success_count >= SUCCESS_THRESHOLD {
                    self.close(&mut core);
                    tracing::info!(
                        breaker = %self.name,
                        successes = SUCCESS_THRESHOLD,
                        "Circuit closed after successful probes"
                    );
                }
            }
            CircuitState::Closed => {
                core.failure_count = 0;
                core.success_count = 0;
            }
            CircuitState::Open => {
                // Attempt admitted before the circuit opened. A reset-on-success
                // breaker would close the circuit here; deliberately, the open
                // episode stands until its cooldown runs out.
                tracing::debug!(breaker = %self.name, "Late success while open ignored");
            }
        }
    }

    fn record_failure(self: &Arc<Self>, message: String) {
        metrics::record_breaker_call(&self.name, "failure");
        let mut core = self.lock();
        core.failure_count += 1;
        tracing::warn!(
            breaker = %self.name,
            failure_count = core.failure_count,
            threshold = self.threshold,
            error = %message,
            "Guarded call failed"
        );
        core.last_error = Some(message);

        if core.failure_count >= self.threshold && core.state != CircuitState::Open {
            self.trip(&mut core);
        }
    }

    fn trip(self: &Arc<Self>, core: &mut Core) {
        core.open_epoch += 1;
        core.success_count = 0;
        core.next_attempt = deadline_after(Instant::now(), self.cooldown);
        core.next_attempt_epoch_ms = epoch_millis().saturating_add(saturating_millis(self.cooldown));
        self.set_state(core, CircuitState::Open);

        tracing::warn!(
            breaker = %self.name,
            failure_count = core.failure_count,
            next_attempt = core.next_attempt_epoch_ms,
            cooldown_ms = saturating_millis(self.cooldown),
            "Circuit opened"
        );

        if let Some(stale) = core.half_open_timer.take() {
            stale.abort();
        }
        core.half_open_timer = Some(self.schedule_half_open(core.open_epoch));
    }

    /// Deferred Open → Half-Open for an idle breaker.
    fn schedule_half_open(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let delay = self.cooldown.saturating_add(HALF_OPEN_GRACE);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire_open(epoch);
            }
        })
    }

    fn expire_open(&self, epoch: u64) {
        let mut core = self.lock();
        if core.state != CircuitState::Open || core.open_epoch != epoch {
            return;
        }
        core.half_open_timer = None;
        self.set_state(&mut core, CircuitState::HalfOpen);
        tracing::info!(breaker = %self.name, "Auto-transition to HALF-OPEN");
    }

    fn close(&self, core: &mut Core) {
        core.failure_count = 0;
        core.success_count = 0;
        self.set_state(core, CircuitState::Closed);
    }

    fn set_state(&self, core: &mut Core, to: CircuitState) {
        let from = core.state;
        if from == to {
            return;
        }
        if from == CircuitState::HalfOpen {
            core.success_count = 0;
        }
        core.state = to;
        tracing::debug!(breaker = %self.name, from = %from, to = %to, "State transition");
        metrics::record_breaker_transition(&self.name, to);
    }
}

/// Upper bound for an open episode when `now + cooldown` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(now: Instant, cooldown: Duration) -> Instant {
    now.checked_add(cooldown)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Whole milliseconds of `d`, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
