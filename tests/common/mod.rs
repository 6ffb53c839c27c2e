//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credit_resilience::config::ServiceConfig;
use credit_resilience::resilience::{BreakerConfig, CircuitBreaker, FailurePredicate};
use credit_resilience::scoring::{Features, RiskModel, ScoringError};
use thiserror::Error;

/// Errors produced by test upstreams.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("upstream unavailable")]
    Unavailable,
    #[error("bad request")]
    BadRequest,
}

/// Threshold 3, recovery 30s, two probe successes, 1s deadline.
pub fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        recovery_timeout: Duration::from_secs(30),
        success_threshold: 2,
        call_timeout: Duration::from_secs(1),
        window_size: 20,
        failure_predicate: FailurePredicate::new(|err| {
            matches!(
                err.downcast_ref::<UpstreamError>(),
                Some(UpstreamError::Unavailable)
            )
        }),
    }
}

pub fn breaker(name: &str) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(name, breaker_config()))
}

pub async fn fail(cb: &CircuitBreaker) {
    let _ = cb
        .call(|| async { Err::<u32, _>(UpstreamError::Unavailable) })
        .await;
}

pub async fn succeed(cb: &CircuitBreaker) -> u32 {
    cb.call(|| async { Ok::<_, UpstreamError>(7) })
        .await
        .unwrap()
}

/// Service config with fast breaker settings and an exact fallback scorer.
pub fn service_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.admin.api_key = "test-key".to_string();
    config.breaker.call_timeout_ms = 500;
    config.scoring.fallback_jitter = 0.0;
    config
}

/// What the programmable model does on the next call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Healthy(f64),
    Failing,
    Hanging,
    RejectInput,
}

/// Risk model whose behaviour can be switched while it is in use.
#[derive(Debug, Clone)]
pub struct ProgrammableModel {
    mode: Arc<Mutex<Mode>>,
    calls: Arc<AtomicUsize>,
}

impl ProgrammableModel {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Number of times the model was actually invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RiskModel for ProgrammableModel {
    fn version(&self) -> &str {
        "programmable"
    }

    fn predict(
        &self,
        _features: &Features,
    ) -> impl Future<Output = Result<f64, ScoringError>> + Send {
        let mode = *self.mode.lock().unwrap();
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match mode {
                Mode::Healthy(score) => Ok(score),
                Mode::Failing => Err(ScoringError::Unavailable("scripted outage".into())),
                Mode::Hanging => {
                    std::future::pending::<()>().await;
                    Ok(0.0)
                }
                Mode::RejectInput => Err(ScoringError::InvalidFeatures("scripted".into())),
            }
        }
    }
}
