//! Service health scoring.
//!
//! # Score
//! ```text
//! 100
//!   - 40 if the breaker is open, 20 if half-open
//!   - 30 × recent failure rate
//!   - 20 × fallback ratio
//!   - min(10, (avg latency - 2s) × 5) when avg latency > 2s
//! clamped to [0, 100]
//! ```
//!
//! # Status
//! `>= 90` excellent, `>= 75` good, `>= 50` degraded, `>= 25` poor, else critical.

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::{BreakerState, BreakerStatus};
use crate::scoring::service::PerformanceSnapshot;

const LATENCY_BASELINE_SECS: f64 = 2.0;
const SLOW_LATENCY_SECS: f64 = 3.0;
const HIGH_FAILURE_RATE: f64 = 0.2;
const HIGH_FALLBACK_RATIO: f64 = 0.3;

/// Categorical health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Degraded,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthStatus::Excellent
        } else if score >= 75.0 {
            HealthStatus::Good
        } else if score >= 50.0 {
            HealthStatus::Degraded
        } else if score >= 25.0 {
            HealthStatus::Poor
        } else {
            HealthStatus::Critical
        }
    }
}

/// Everything the score depends on, captured at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub state: BreakerState,
    pub recent_failure_rate: f64,
    pub fallback_ratio: f64,
    pub average_latency_secs: f64,
}

impl HealthInputs {
    pub fn new(breaker: &BreakerStatus, performance: &PerformanceSnapshot) -> Self {
        Self {
            state: breaker.state,
            recent_failure_rate: breaker.metrics.recent_failure_rate,
            fallback_ratio: performance.fallback_ratio,
            average_latency_secs: performance.average_latency_ms / 1000.0,
        }
    }

    pub fn score(&self) -> f64 {
        let mut score = 100.0;

        score -= match self.state {
            BreakerState::Open => 40.0,
            BreakerState::HalfOpen => 20.0,
            BreakerState::Closed => 0.0,
        };
        score -= self.recent_failure_rate * 30.0;
        score -= self.fallback_ratio * 20.0;
        if self.average_latency_secs > LATENCY_BASELINE_SECS {
            score -= ((self.average_latency_secs - LATENCY_BASELINE_SECS) * 5.0).min(10.0);
        }

        score.clamp(0.0, 100.0)
    }

    /// One line per active problem, or a single all-clear line.
    pub fn recommendations(&self, service: &str) -> Vec<String> {
        let mut recommendations = Vec::new();

        match self.state {
            BreakerState::Open => recommendations.push(format!(
                "Circuit breaker for '{service}' is open - investigate the upstream service"
            )),
            BreakerState::HalfOpen => recommendations.push(format!(
                "Circuit breaker for '{service}' is half-open - recovery is being probed"
            )),
            BreakerState::Closed => {}
        }
        if self.recent_failure_rate > HIGH_FAILURE_RATE {
            recommendations.push(format!(
                "High failure rate ({:.1}%) - check upstream service stability",
                self.recent_failure_rate * 100.0
            ));
        }
        if self.fallback_ratio > HIGH_FALLBACK_RATIO {
            recommendations.push(format!(
                "High fallback usage ({:.1}%) - primary service may be unreliable",
                self.fallback_ratio * 100.0
            ));
        }
        if self.average_latency_secs > SLOW_LATENCY_SECS {
            recommendations.push(format!(
                "Slow response times ({:.2}s) - consider service optimization",
                self.average_latency_secs
            ));
        }

        if recommendations.is_empty() {
            recommendations.push("Service is operating normally".to_string());
        }
        recommendations
    }
}

/// Health of the protected scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub service_name: String,
    pub health_score: f64,
    pub status: HealthStatus,
    pub recommendations: Vec<String>,
    pub circuit_breaker: BreakerStatus,
    pub performance: PerformanceSnapshot,
}

impl HealthReport {
    pub fn build(breaker: BreakerStatus, performance: PerformanceSnapshot) -> Self {
        let inputs = HealthInputs::new(&breaker, &performance);
        let health_score = inputs.score();
        Self {
            service_name: breaker.name.clone(),
            health_score,
            status: HealthStatus::from_score(health_score),
            recommendations: inputs.recommendations(&breaker.name),
            circuit_breaker: breaker,
            performance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(state: BreakerState, failure: f64, fallback: f64, latency: f64) -> HealthInputs {
        HealthInputs {
            state,
            recent_failure_rate: failure,
            fallback_ratio: fallback,
            average_latency_secs: latency,
        }
    }

    #[test]
    fn test_perfect_health() {
        let healthy = inputs(BreakerState::Closed, 0.0, 0.0, 0.3);
        assert_eq!(healthy.score(), 100.0);
        assert_eq!(healthy.recommendations("svc"), vec!["Service is operating normally"]);
    }

    #[test]
    fn test_penalties_add_up() {
        // 100 - 20 - 30*0.5 - 20*0.25 - min(10, 1*5) = 55
        let degraded = inputs(BreakerState::HalfOpen, 0.5, 0.25, 3.0);
        assert!((degraded.score() - 55.0).abs() < 1e-9);
        assert_eq!(HealthStatus::from_score(degraded.score()), HealthStatus::Degraded);
    }

    #[test]
    fn test_latency_penalty_is_capped() {
        let slow = inputs(BreakerState::Closed, 0.0, 0.0, 60.0);
        assert_eq!(slow.score(), 90.0);
    }

    #[test]
    fn test_score_never_negative() {
        let worst = inputs(BreakerState::Open, 1.0, 1.0, 100.0);
        assert_eq!(worst.score(), 0.0);
        assert_eq!(HealthStatus::from_score(worst.score()), HealthStatus::Critical);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(HealthStatus::from_score(90.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(89.9), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(75.0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(50.0), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(25.0), HealthStatus::Poor);
        assert_eq!(HealthStatus::from_score(24.9), HealthStatus::Critical);
    }

    #[test]
    fn test_recommendations_follow_active_penalties() {
        let recs = inputs(BreakerState::Open, 0.5, 0.6, 4.0).recommendations("svc");
        assert_eq!(recs.len(), 4);
        assert!(recs[0].contains("is open"));
        assert!(recs[1].contains("50.0%"));
        assert!(recs[2].contains("60.0%"));
        assert!(recs[3].contains("4.00s"));
    }
}
