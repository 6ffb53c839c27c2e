//! Upstream risk model interface.
//!
//! # Responsibilities
//! - Define the async contract for the primary risk model
//! - Classify model errors into service failures and caller errors
//! - Provide a simulated model for local runs and tests

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::config::SimulatedModelConfig;
use crate::scoring::features::{self, Features};

/// Errors raised by a risk model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    /// The model service reported it cannot serve right now.
    #[error("risk model unavailable: {0}")]
    Unavailable(String),

    /// The model service could not be reached.
    #[error("risk model connection failed: {0}")]
    Connection(String),

    /// The model service gave up on the request.
    #[error("risk model timed out")]
    Timeout,

    /// The caller sent features the model cannot score.
    #[error("invalid features: {0}")]
    InvalidFeatures(String),
}

impl ScoringError {
    /// Whether this error says something about the model's health.
    ///
    /// Invalid input is the caller's problem and must not trip the breaker.
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, ScoringError::InvalidFeatures(_))
    }
}

/// A primary risk model returning a score in `[0, 1]`.
pub trait RiskModel: Send + Sync + 'static {
    fn version(&self) -> &str;

    fn predict(
        &self,
        features: &Features,
    ) -> impl Future<Output = Result<f64, ScoringError>> + Send;
}

/// Reject inputs no model could score.
pub fn validate_features(features: &Features) -> Result<(), ScoringError> {
    for key in [
        features::TRANSACTION_COUNT,
        features::AVG_TRANSACTION_AMOUNT,
        features::CURRENT_CREDIT_LIMIT,
    ] {
        if let Some(value) = features.number(key) {
            if value < 0.0 {
                return Err(ScoringError::InvalidFeatures(format!(
                    "{key} must not be negative, got {value}"
                )));
            }
        }
    }
    Ok(())
}

/// Simulated model: random scores with configurable latency and faults.
#[derive(Debug, Clone)]
pub struct SimulatedRiskModel {
    config: SimulatedModelConfig,
}

enum Roll {
    Hang,
    Fail(ScoringError),
    Score { latency: Duration, score: f64 },
}

impl SimulatedRiskModel {
    pub const VERSION: &'static str = "v1.0.0";

    pub fn new(config: SimulatedModelConfig) -> Self {
        Self { config }
    }

    fn roll(&self) -> Roll {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.config.hang_rate.clamp(0.0, 1.0)) {
            return Roll::Hang;
        }
        if rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0)) {
            let err = match rng.gen_range(0..3) {
                0 => ScoringError::Unavailable("model service temporarily unavailable".into()),
                1 => ScoringError::Connection("unable to connect to model service".into()),
                _ => ScoringError::Timeout,
            };
            return Roll::Fail(err);
        }

        let (min, max) = (self.config.min_latency_ms, self.config.max_latency_ms);
        let latency = Duration::from_millis(rng.gen_range(min..=max.max(min)));
        let score = (rng.gen_range(0.0..=1.0_f64) * 1000.0).round() / 1000.0;
        Roll::Score { latency, score }
    }
}

impl RiskModel for SimulatedRiskModel {
    fn version(&self) -> &str {
        Self::VERSION
    }

    fn predict(
        &self,
        features: &Features,
    ) -> impl Future<Output = Result<f64, ScoringError>> + Send {
        let checked = validate_features(features);
        let roll = self.roll();
        async move {
            checked?;
            match roll {
                Roll::Hang => {
                    // Never answers; the breaker deadline cancels this.
                    std::future::pending::<()>().await;
                    Err(ScoringError::Timeout)
                }
                Roll::Fail(err) => Err(err),
                Roll::Score { latency, score } => {
                    tokio::time::sleep(latency).await;
                    Ok(score)
                }
            }
        }
    }
}
