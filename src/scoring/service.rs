//! Risk scoring protected by a circuit breaker.
//!
//! # Request Flow
//! ```text
//! score_risk(features)
//!     → breaker admits?  no → rule-based fallback
//!     → model.predict (bounded by call_timeout)
//!         ok                → primary score
//!         service failure   → rule-based fallback
//!         timeout           → rule-based fallback
//!         invalid input     → ScoringError (breaker untouched)
//!     → fallback panicked?  → EMERGENCY_SCORE
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::ServiceConfig;
use crate::health::report::HealthReport;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{
    BreakerError, BreakerState, CircuitBreaker, FailurePredicate,
};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::window::unix_millis;
use crate::scoring::fallback::{FallbackScorer, RuleBasedScorer};
use crate::scoring::features::Features;
use crate::scoring::model::{RiskModel, ScoringError};

/// Score returned when even the fallback scorer fails. Sits above the 0.6
/// approval cut-off.
pub const EMERGENCY_SCORE: f64 = 0.7;

const EMERGENCY_VERSION: &str = "emergency";

/// Which path produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Primary,
    Fallback,
    EmergencyFallback,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Primary => "primary",
            ScoreSource::Fallback => "fallback",
            ScoreSource::EmergencyFallback => "emergency_fallback",
        }
    }
}

/// Result of one scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub source: ScoreSource,
    pub breaker_state: BreakerState,
    pub latency_ms: f64,
    pub model_version: String,
    pub features_used: Vec<String>,
}

/// Facade performance as reported by monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_predictions: u64,
    pub primary_predictions: u64,
    /// Rule-based and emergency answers together.
    pub fallback_predictions: u64,
    pub emergency_predictions: u64,
    pub average_latency_ms: f64,
    pub fallback_ratio: f64,
    pub last_prediction_at: Option<u64>,
}

#[derive(Debug, Default)]
struct PerformanceCounters {
    total: u64,
    primary: u64,
    fallback: u64,
    emergency: u64,
    mean_latency_ms: f64,
    last_prediction_at: Option<u64>,
}

impl PerformanceCounters {
    fn record(&mut self, source: ScoreSource, latency_ms: f64) {
        self.total += 1;
        match source {
            ScoreSource::Primary => self.primary += 1,
            ScoreSource::Fallback => self.fallback += 1,
            ScoreSource::EmergencyFallback => {
                self.fallback += 1;
                self.emergency += 1;
            }
        }
        self.mean_latency_ms += (latency_ms - self.mean_latency_ms) / self.total as f64;
        self.last_prediction_at = Some(unix_millis());
    }

    fn snapshot(&self) -> PerformanceSnapshot {
        let fallback_ratio = if self.total == 0 {
            0.0
        } else {
            self.fallback as f64 / self.total as f64
        };
        PerformanceSnapshot {
            total_predictions: self.total,
            primary_predictions: self.primary,
            fallback_predictions: self.fallback,
            emergency_predictions: self.emergency,
            average_latency_ms: self.mean_latency_ms,
            fallback_ratio,
            last_prediction_at: self.last_prediction_at,
        }
    }
}

/// Only model-health errors trip the breaker; invalid input passes through.
pub fn failure_predicate() -> FailurePredicate {
    FailurePredicate::new(|err| {
        err.downcast_ref::<ScoringError>()
            .is_some_and(ScoringError::is_service_failure)
    })
}

/// Risk model behind a circuit breaker with a rule-based fallback.
pub struct ProtectedScoringService<M, S = RuleBasedScorer> {
    model: M,
    scorer: S,
    breaker: Arc<CircuitBreaker>,
    counters: Mutex<PerformanceCounters>,
}

impl<M: RiskModel> ProtectedScoringService<M, RuleBasedScorer> {
    /// Build the service from config, registering its breaker.
    pub fn from_config(model: M, registry: &BreakerRegistry, config: &ServiceConfig) -> Self {
        let breaker = registry.create(
            config.breaker.name.clone(),
            config.breaker.to_breaker_config(failure_predicate()),
        );
        Self::new(
            model,
            RuleBasedScorer::new(config.scoring.fallback_jitter),
            breaker,
        )
    }
}

impl<M: RiskModel, S: FallbackScorer> ProtectedScoringService<M, S> {
    pub fn new(model: M, scorer: S, breaker: Arc<CircuitBreaker>) -> Self {
        tracing::info!(
            breaker = %breaker.name(),
            model_version = model.version(),
            fallback_version = scorer.version(),
            "Protected scoring service initialized"
        );
        Self {
            model,
            scorer,
            breaker,
            counters: Mutex::new(PerformanceCounters::default()),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Score `features`, degrading to the fallback when the model is unhealthy.
    ///
    /// Only caller errors (invalid features) are returned as `Err`.
    pub async fn score_risk(&self, features: &Features) -> Result<RiskAssessment, ScoringError> {
        let started = Instant::now();

        let result = self
            .breaker
            .call_with_fallback(
                || async {
                    self.model
                        .predict(features)
                        .await
                        .map(|score| (score, ScoreSource::Primary))
                },
                || async { Ok(self.fallback_score(features)) },
            )
            .await;

        let (risk_score, source) = match result {
            Ok(scored) => scored,
            Err(BreakerError::Unclassified(err)) => {
                tracing::debug!(error = %err, "Scoring request rejected");
                return Err(err);
            }
            Err(err) => {
                tracing::error!(error = %err, "Scoring failed on every path, using emergency score");
                (EMERGENCY_SCORE, ScoreSource::EmergencyFallback)
            }
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.counters().record(source, latency_ms);
        metrics::record_prediction(source.as_str());

        let model_version = match source {
            ScoreSource::Primary => self.model.version(),
            ScoreSource::Fallback => self.scorer.version(),
            ScoreSource::EmergencyFallback => EMERGENCY_VERSION,
        };
        // The emergency constant does not depend on any feature.
        let features_used = match source {
            ScoreSource::EmergencyFallback => Vec::new(),
            ScoreSource::Primary | ScoreSource::Fallback => features.keys(),
        };

        tracing::debug!(
            risk_score,
            source = source.as_str(),
            latency_ms,
            "Risk scored"
        );

        Ok(RiskAssessment {
            risk_score,
            source,
            breaker_state: self.breaker.state(),
            latency_ms,
            model_version: model_version.to_string(),
            features_used,
        })
    }

    fn fallback_score(&self, features: &Features) -> (f64, ScoreSource) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.scorer.score(features))) {
            Ok(score) => (score, ScoreSource::Fallback),
            Err(_) => {
                tracing::error!(
                    breaker = %self.breaker.name(),
                    "Fallback scorer panicked, using emergency score"
                );
                (EMERGENCY_SCORE, ScoreSource::EmergencyFallback)
            }
        }
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.counters().snapshot()
    }

    pub fn health_report(&self) -> HealthReport {
        let report = HealthReport::build(self.breaker.status(), self.performance());
        metrics::record_health_score(report.health_score);
        report
    }

    pub fn health_score(&self) -> f64 {
        self.health_report().health_score
    }

    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }

    pub fn force_breaker_open(&self) {
        self.breaker.force_open();
    }

    fn counters(&self) -> MutexGuard<'_, PerformanceCounters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
