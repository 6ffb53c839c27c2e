//! Circuit breaker for protecting calls to an unreliable service.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: service assumed down, calls fail fast (or go to the fallback)
//! - Half-Open: testing if the service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first call after recovery_timeout (that call is the probe)
//! Half-Open → Closed: success_threshold consecutive probe successes
//! Half-Open → Open: any probe failure
//! ```
//!
//! # Design Decisions
//! - One breaker per named dependency, registered in a `BreakerRegistry`
//! - The lock covers only the admit and record steps; the work runs outside it
//! - A success in Closed only decrements the failure count, so isolated
//!   failures mixed with successes never trip the breaker
//! - Single probe in Half-Open (prevents hammering a recovering service)
//! - Errors the failure predicate does not match bypass the breaker entirely

use std::error::Error as StdError;
use std::fmt;
use std::future::{self, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::timeouts::{run_with_deadline, Deadline};
use crate::resilience::window::MetricsWindow;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type PredicateFn = dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync;

/// Decides which work errors count as service failures.
///
/// Errors that do not match are treated as bugs in the caller (bad input,
/// programming errors) and are returned untouched without affecting the
/// breaker.
#[derive(Clone)]
pub struct FailurePredicate(Arc<PredicateFn>);

impl FailurePredicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Every error is a failure.
    pub fn any() -> Self {
        Self::new(|_| true)
    }

    /// Only errors of type `E` are failures.
    pub fn of_type<E: StdError + 'static>() -> Self {
        Self::new(|err| err.is::<E>())
    }

    pub fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        (self.0)(err)
    }
}

impl Default for FailurePredicate {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Debug for FailurePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailurePredicate(..)")
    }
}

/// Immutable breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Closed-state failures before opening.
    pub failure_threshold: u32,
    /// Minimum time spent Open before a probe is allowed.
    pub recovery_timeout: Duration,
    /// Consecutive Half-Open successes required to close.
    pub success_threshold: u32,
    /// Deadline for a single protected call.
    pub call_timeout: Duration,
    /// Capacity of the rolling outcome window.
    pub window_size: usize,
    pub failure_predicate: FailurePredicate,
}

impl BreakerConfig {
    pub fn with_failure_predicate(mut self, predicate: FailurePredicate) -> Self {
        self.failure_predicate = predicate;
        self
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            call_timeout: Duration::from_secs(10),
            window_size: 100,
            failure_predicate: FailurePredicate::any(),
        }
    }
}

/// Errors surfaced by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker blocked the call and no fallback was given.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The call exceeded its deadline and no fallback was given.
    #[error("call through circuit breaker '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The work failed with a matched error and no fallback was given.
    #[error(transparent)]
    Upstream(E),

    /// The work failed with an error the predicate does not match.
    #[error(transparent)]
    Unclassified(E),

    /// The fallback itself failed.
    #[error(transparent)]
    Fallback(E),
}

impl<E> BreakerError<E> {
    /// The underlying work or fallback error, if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Upstream(e) | BreakerError::Unclassified(e) | BreakerError::Fallback(e) => {
                Some(e)
            }
            BreakerError::Open { .. } | BreakerError::Timeout { .. } => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }
}

/// Config values as reported in a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfigView {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: f64,
    pub success_threshold: u32,
    pub call_timeout_secs: f64,
    pub window_size: usize,
}

/// Call metrics as reported in a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub failure_rate: f64,
    pub recent_failure_rate: f64,
    pub average_latency_ms: f64,
    pub times_opened: u64,
    pub window_len: usize,
    pub last_success_at: Option<u64>,
    pub last_failure_at: Option<u64>,
}

/// Read-only snapshot of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub config: BreakerConfigView,
    pub metrics: BreakerMetrics,
}

/// Mutable state guarded by the breaker lock.
#[derive(Debug)]
struct BreakerCore {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_state_change: Option<Instant>,
    probe_in_flight: bool,
    times_opened: u64,
    /// Bumped on every transition and reset; permits from an older
    /// generation only feed the window.
    generation: u64,
    window: MetricsWindow,
}

impl BreakerCore {
    fn new(window_size: usize) -> Self {
        Self {
            generation: 0,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_state_change: None,
            probe_in_flight: false,
            times_opened: 0,
            window: MetricsWindow::new(window_size),
        }
    }
}

/// A named three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a new breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            recovery_timeout = ?config.recovery_timeout,
            call_timeout = ?config.call_timeout,
            window_size = config.window_size,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&name, BreakerState::Closed);
        Self {
            core: Mutex::new(BreakerCore::new(config.window_size)),
            name,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. Does not advance Open to Half-Open.
    pub fn state(&self) -> BreakerState {
        self.core().state
    }

    /// Recent (window) failure rate.
    pub fn recent_failure_rate(&self) -> f64 {
        self.core().window.recent_failure_rate()
    }

    /// Run `work` through the breaker without a fallback.
    pub async fn call<T, E, W, Fut>(&self, work: W) -> Result<T, BreakerError<E>>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.execute(work, None::<fn() -> future::Ready<Result<T, E>>>)
            .await
    }

    /// Run `work` through the breaker, answering with `fallback` whenever the
    /// work is blocked, fails with a matched error, or times out.
    pub async fn call_with_fallback<T, E, W, Fut, F, FFut>(
        &self,
        work: W,
        fallback: F,
    ) -> Result<T, BreakerError<E>>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.execute(work, Some(fallback)).await
    }

    async fn execute<T, E, W, Fut, F, FFut>(
        &self,
        work: W,
        fallback: Option<F>,
    ) -> Result<T, BreakerError<E>>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let Some(permit) = self.admit() else {
            metrics::record_breaker_call(&self.name, "rejected", None);
            return match fallback {
                Some(fallback) => {
                    tracing::debug!(breaker = %self.name, "Circuit open, serving fallback");
                    fallback().await.map_err(BreakerError::Fallback)
                }
                None => {
                    tracing::debug!(breaker = %self.name, "Circuit open, rejecting call");
                    Err(BreakerError::Open {
                        name: self.name.clone(),
                    })
                }
            };
        };

        match run_with_deadline(self.config.call_timeout, work()).await {
            Deadline::Completed {
                output: Ok(value),
                elapsed,
            } => {
                permit.record(true, elapsed);
                metrics::record_breaker_call(&self.name, "success", Some(elapsed));
                Ok(value)
            }
            Deadline::Completed {
                output: Err(err),
                elapsed,
            } => {
                if !self.config.failure_predicate.matches(&err) {
                    // Dropping the permit frees a probe slot without recording.
                    drop(permit);
                    metrics::record_breaker_call(&self.name, "unclassified", None);
                    return Err(BreakerError::Unclassified(err));
                }

                tracing::warn!(breaker = %self.name, error = %err, "Protected call failed");
                permit.record(false, elapsed);
                metrics::record_breaker_call(&self.name, "failure", Some(elapsed));
                match fallback {
                    Some(fallback) => fallback().await.map_err(BreakerError::Fallback),
                    None => Err(BreakerError::Upstream(err)),
                }
            }
            Deadline::Expired { elapsed } => {
                tracing::warn!(
                    breaker = %self.name,
                    timeout = ?self.config.call_timeout,
                    "Protected call timed out"
                );
                permit.record(false, elapsed);
                metrics::record_breaker_call(&self.name, "timeout", Some(elapsed));
                match fallback {
                    Some(fallback) => fallback().await.map_err(BreakerError::Fallback),
                    None => Err(BreakerError::Timeout {
                        name: self.name.clone(),
                        timeout: self.config.call_timeout,
                    }),
                }
            }
        }
    }

    /// Decide whether a call may run. Returns `None` when blocked.
    fn admit(&self) -> Option<Permit<'_>> {
        let mut core = self.core();
        match core.state {
            BreakerState::Closed => Some(Permit::new(self, false, core.generation)),
            BreakerState::Open => {
                let recovered = core
                    .last_state_change
                    .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
                if !recovered {
                    return None;
                }
                self.transition(&mut core, BreakerState::HalfOpen);
                core.consecutive_successes = 0;
                core.probe_in_flight = true;
                tracing::info!(breaker = %self.name, "Recovery timeout elapsed, probing service");
                Some(Permit::new(self, true, core.generation))
            }
            BreakerState::HalfOpen => {
                if core.probe_in_flight {
                    return None;
                }
                core.probe_in_flight = true;
                Some(Permit::new(self, true, core.generation))
            }
        }
    }

    /// Apply one outcome to the window and the state machine.
    fn on_outcome(&self, success: bool, latency: Duration, probe: bool, generation: u64) {
        let mut core = self.core();
        core.window.record(success, latency);

        if generation != core.generation {
            tracing::debug!(
                breaker = %self.name,
                success,
                "Result admitted before the last transition, metrics only"
            );
            return;
        }
        if probe {
            core.probe_in_flight = false;
        }

        match (core.state, success) {
            (BreakerState::Closed, true) => {
                core.consecutive_failures = core.consecutive_failures.saturating_sub(1);
            }
            (BreakerState::Closed, false) => {
                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold.max(1) {
                    tracing::error!(
                        breaker = %self.name,
                        failures = core.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    self.transition(&mut core, BreakerState::Open);
                }
            }
            (BreakerState::HalfOpen, true) => {
                core.consecutive_successes += 1;
                if core.consecutive_successes >= self.config.success_threshold.max(1) {
                    tracing::info!(
                        breaker = %self.name,
                        successes = core.consecutive_successes,
                        "Service recovered, circuit closed"
                    );
                    self.transition(&mut core, BreakerState::Closed);
                    core.consecutive_failures = 0;
                    core.consecutive_successes = 0;
                }
            }
            (BreakerState::HalfOpen, false) => {
                tracing::warn!(breaker = %self.name, "Recovery probe failed, circuit reopened");
                core.consecutive_successes = 0;
                self.transition(&mut core, BreakerState::Open);
            }
            // Nothing is admitted while Open.
            (BreakerState::Open, _) => {}
        }
    }

    fn transition(&self, core: &mut BreakerCore, to: BreakerState) {
        let from = core.state;
        core.state = to;
        core.last_state_change = Some(Instant::now());
        core.generation += 1;
        if to == BreakerState::Open {
            core.times_opened += 1;
        }
        tracing::debug!(breaker = %self.name, from = %from, to = %to, "State transition");
        metrics::record_breaker_transition(&self.name, to);
    }

    /// Force the breaker Closed with every counter and the window cleared.
    pub fn reset(&self) {
        let mut core = self.core();
        let generation = core.generation + 1;
        *core = BreakerCore::new(self.config.window_size);
        core.generation = generation;
        metrics::record_breaker_transition(&self.name, BreakerState::Closed);
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
    }

    /// Force the breaker Open, restarting the recovery countdown.
    pub fn force_open(&self) {
        let mut core = self.core();
        core.consecutive_successes = 0;
        core.probe_in_flight = false;
        self.transition(&mut core, BreakerState::Open);
        tracing::warn!(breaker = %self.name, "Circuit breaker manually forced open");
    }

    /// Side-effect-free snapshot.
    pub fn status(&self) -> BreakerStatus {
        let core = self.core();
        BreakerStatus {
            name: self.name.clone(),
            state: core.state,
            consecutive_failures: core.consecutive_failures,
            consecutive_successes: core.consecutive_successes,
            config: BreakerConfigView {
                failure_threshold: self.config.failure_threshold,
                recovery_timeout_secs: self.config.recovery_timeout.as_secs_f64(),
                success_threshold: self.config.success_threshold,
                call_timeout_secs: self.config.call_timeout.as_secs_f64(),
                window_size: core.window.capacity(),
            },
            metrics: BreakerMetrics {
                total_calls: core.window.total(),
                successful_calls: core.window.successes(),
                failed_calls: core.window.failures(),
                failure_rate: core.window.lifetime_failure_rate(),
                recent_failure_rate: core.window.recent_failure_rate(),
                average_latency_ms: core.window.average_latency().as_secs_f64() * 1000.0,
                times_opened: core.times_opened,
                window_len: core.window.len(),
                last_success_at: core.window.last_success_at(),
                last_failure_at: core.window.last_failure_at(),
            },
        }
    }

    fn core(&self) -> MutexGuard<'_, BreakerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission ticket for one attempted call.
///
/// A probe permit that is dropped without recording (the call was cancelled
/// or returned an unclassified error) frees the probe slot, unless the
/// breaker has moved on since the permit was issued.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    generation: u64,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool, generation: u64) -> Self {
        Self {
            breaker,
            probe,
            generation,
            settled: false,
        }
    }

    fn record(mut self, success: bool, latency: Duration) {
        self.settled = true;
        self.breaker
            .on_outcome(success, latency, self.probe, self.generation);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            let mut core = self.breaker.core();
            if core.generation == self.generation {
                core.probe_in_flight = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("upstream unavailable")]
        Unavailable,
        #[error("invalid request")]
        Invalid,
    }

    fn breaker() -> CircuitBreaker {
        let config = BreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
            call_timeout: Duration::from_secs(1),
            window_size: 10,
            failure_predicate: FailurePredicate::new(|err| {
                matches!(err.downcast_ref::<TestError>(), Some(TestError::Unavailable))
            }),
        };
        CircuitBreaker::new("test", config)
    }

    async fn fail(cb: &CircuitBreaker) {
        let result = cb.call(|| async { Err::<u32, _>(TestError::Unavailable) }).await;
        assert!(matches!(result, Err(BreakerError::Upstream(TestError::Unavailable))));
    }

    async fn succeed(cb: &CircuitBreaker) {
        let result = cb.call(|| async { Ok::<_, TestError>(1u32) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_decrements_failure_count() {
        let cb = breaker();
        fail(&cb).await;
        fail(&cb).await;
        succeed(&cb).await;
        assert_eq!(cb.status().consecutive_failures, 1);
        // Two more failures are needed, not one.
        fail(&cb).await;
        assert_eq!(cb.state(), BreakerState::Closed);
        fail(&cb).await;
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_fallback() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }

        let invoked = std::sync::atomic::AtomicBool::new(false);
        let result = cb
            .call(|| async {
                invoked.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, TestError>(1u32)
            })
            .await;
        assert!(result.as_ref().is_err_and(|e| e.is_open()));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(result.unwrap_err().to_string(), "circuit breaker 'test' is open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cb = breaker();
        let result = cb
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, TestError>(1u32)
            })
            .await;
        assert!(result.is_err_and(|e| e.is_timeout()));

        let status = cb.status();
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.metrics.failed_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_fallback_returns_fallback() {
        let cb = breaker();
        let result = cb
            .call_with_fallback(
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, TestError>(1u32)
                },
                || async { Ok(99) },
            )
            .await;
        assert_eq!(result.unwrap(), 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_error_is_not_reclassified() {
        let cb = breaker();
        let result = cb
            .call_with_fallback(
                || async { Err::<u32, _>(TestError::Unavailable) },
                || async { Err(TestError::Invalid) },
            )
            .await;
        assert!(matches!(result, Err(BreakerError::Fallback(TestError::Invalid))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_single_probe() {
        let cb = breaker();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(31)).await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let probe = cb.call(move || async move {
            let _ = rx.await;
            Ok::<_, TestError>(1u32)
        });
        tokio::pin!(probe);

        // Start the probe without finishing it.
        assert!(futures_util::poll!(probe.as_mut()).is_pending());
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        let second = cb.call(|| async { Ok::<_, TestError>(2u32) }).await;
        assert!(second.is_err_and(|e| e.is_open()));

        tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap(), 1);
        assert_eq!(cb.status().consecutive_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_frees_slot() {
        let cb = breaker();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(31)).await;

        {
            let probe = cb.call(|| future::pending::<Result<u32, TestError>>());
            tokio::pin!(probe);
            assert!(futures_util::poll!(probe.as_mut()).is_pending());
        }

        assert_eq!(cb.state(), BreakerState::HalfOpen);
        succeed(&cb).await;
        assert_eq!(cb.status().consecutive_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_open_restarts_countdown() {
        let cb = breaker();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(20)).await;
        cb.force_open();
        tokio::time::advance(Duration::from_secs(20)).await;

        let result = cb.call(|| async { Ok::<_, TestError>(1u32) }).await;
        assert!(result.is_err_and(|e| e.is_open()));
        assert_eq!(cb.status().metrics.times_opened, 2);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&BreakerState::HalfOpen).unwrap(), "\"half_open\"");
        assert_eq!(BreakerState::Open.to_string(), "open");
    }

    #[test]
    fn test_predicate_of_type() {
        let predicate = FailurePredicate::of_type::<TestError>();
        assert!(predicate.matches(&TestError::Invalid));
        assert!(!predicate.matches(&std::fmt::Error));
    }
}
