//! System-wide health and diagnostics.
//!
//! Combines the scoring service report with the state of every registered
//! breaker:
//!
//! ```text
//! overall = 0.8 × service score + 0.2 × mean breaker score
//! breaker score: closed 100, half-open 60, open 20 (100 with no breakers)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::health::report::HealthReport;
use crate::resilience::circuit_breaker::{BreakerState, BreakerStatus};

const SERVICE_WEIGHT: f64 = 0.8;
const BREAKER_WEIGHT: f64 = 0.2;

/// Overall system status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl SystemStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            SystemStatus::Healthy
        } else if score >= 75.0 {
            SystemStatus::Degraded
        } else if score >= 50.0 {
            SystemStatus::Unhealthy
        } else {
            SystemStatus::Critical
        }
    }
}

fn state_score(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 100.0,
        BreakerState::HalfOpen => 60.0,
        BreakerState::Open => 20.0,
    }
}

/// Mean state score over all breakers.
pub fn breaker_score(breakers: &BTreeMap<String, BreakerStatus>) -> f64 {
    if breakers.is_empty() {
        return 100.0;
    }
    let sum: f64 = breakers.values().map(|b| state_score(b.state)).sum();
    sum / breakers.len() as f64
}

/// Health of the whole service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall_score: f64,
    pub status: SystemStatus,
    pub scoring_service_score: f64,
    pub circuit_breaker_score: f64,
    pub recommendations: Vec<String>,
    pub scoring_service: HealthReport,
    pub circuit_breakers: BTreeMap<String, BreakerStatus>,
}

impl SystemHealth {
    pub fn assess(service: HealthReport, breakers: BTreeMap<String, BreakerStatus>) -> Self {
        let breaker_score = breaker_score(&breakers);
        let raw = SERVICE_WEIGHT * service.health_score + BREAKER_WEIGHT * breaker_score;
        let overall_score = (raw * 10.0).round() / 10.0;

        let mut recommendations = Vec::new();
        if service.health_score < 80.0 {
            recommendations.extend(service.recommendations.iter().cloned());
        }
        if breaker_score < 80.0 {
            recommendations.push(
                "Some circuit breakers are not closed - check upstream dependencies"
                    .to_string(),
            );
        }
        if recommendations.is_empty() {
            recommendations.push("System is operating normally".to_string());
        }

        Self {
            overall_score,
            status: SystemStatus::from_score(overall_score),
            scoring_service_score: service.health_score,
            circuit_breaker_score: breaker_score,
            recommendations,
            scoring_service: service,
            circuit_breakers: breakers,
        }
    }
}

/// Issues and follow-up actions for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub system_health: SystemHealth,
    pub potential_issues: Vec<String>,
    pub recommended_actions: Vec<String>,
}

impl Diagnostics {
    pub fn assess(service: HealthReport, breakers: BTreeMap<String, BreakerStatus>) -> Self {
        let potential_issues = potential_issues(&service, &breakers);
        let recommended_actions = recommended_actions(&service, &breakers);
        Self {
            system_health: SystemHealth::assess(service, breakers),
            potential_issues,
            recommended_actions,
        }
    }
}

fn potential_issues(
    service: &HealthReport,
    breakers: &BTreeMap<String, BreakerStatus>,
) -> Vec<String> {
    let mut issues = Vec::new();

    if service.health_score < 70.0 {
        issues.push(format!(
            "Scoring service health is low ({:.1})",
            service.health_score
        ));
    }
    for (name, status) in breakers {
        match status.state {
            BreakerState::Open => issues.push(format!("Circuit breaker '{name}' is open")),
            BreakerState::HalfOpen => {
                issues.push(format!("Circuit breaker '{name}' is testing recovery"))
            }
            BreakerState::Closed => {}
        }
        if status.metrics.recent_failure_rate > 0.2 {
            issues.push(format!(
                "High failure rate in '{name}': {:.1}%",
                status.metrics.recent_failure_rate * 100.0
            ));
        }
    }

    issues
}

fn recommended_actions(
    service: &HealthReport,
    breakers: &BTreeMap<String, BreakerStatus>,
) -> Vec<String> {
    let mut actions = Vec::new();

    if service.health_score < 80.0 {
        actions.extend(service.recommendations.iter().cloned());
    }
    for (name, status) in breakers {
        if status.state == BreakerState::Open {
            actions.push(format!("Investigate the upstream service behind '{name}'"));
        }
        if status.metrics.recent_failure_rate > 0.3 {
            actions.push(format!("Review error logs for '{name}'"));
        }
    }
    if breakers.values().any(|b| b.state != BreakerState::Closed) {
        actions.push("Monitor circuit breaker recovery and keep fallbacks enabled".to_string());
    }

    if actions.is_empty() {
        actions.push("Continue monitoring".to_string());
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{BreakerConfig, CircuitBreaker};
    use crate::scoring::service::PerformanceSnapshot;

    fn idle_performance() -> PerformanceSnapshot {
        PerformanceSnapshot {
            total_predictions: 0,
            primary_predictions: 0,
            fallback_predictions: 0,
            emergency_predictions: 0,
            average_latency_ms: 0.0,
            fallback_ratio: 0.0,
            last_prediction_at: None,
        }
    }

    fn breakers(states: &[(&str, bool)]) -> BTreeMap<String, BreakerStatus> {
        states
            .iter()
            .map(|(name, open)| {
                let cb = CircuitBreaker::new(*name, BreakerConfig::default());
                if *open {
                    cb.force_open();
                }
                (name.to_string(), cb.status())
            })
            .collect()
    }

    #[test]
    fn test_all_closed_is_healthy() {
        let table = breakers(&[("risk_model_service", false)]);
        let service = HealthReport::build(table["risk_model_service"].clone(), idle_performance());

        let health = SystemHealth::assess(service.clone(), table.clone());
        assert_eq!(health.overall_score, 100.0);
        assert_eq!(health.status, SystemStatus::Healthy);
        assert_eq!(health.recommendations, vec!["System is operating normally"]);

        let diagnostics = Diagnostics::assess(service, table);
        assert!(diagnostics.potential_issues.is_empty());
        assert_eq!(diagnostics.recommended_actions, vec!["Continue monitoring"]);
    }

    #[test]
    fn test_open_breaker_weighs_in() {
        let table = breakers(&[("risk_model_service", true)]);
        let service = HealthReport::build(table["risk_model_service"].clone(), idle_performance());
        assert_eq!(service.health_score, 60.0);

        // 0.8 × 60 + 0.2 × 20
        let health = SystemHealth::assess(service.clone(), table.clone());
        assert_eq!(health.overall_score, 52.0);
        assert_eq!(health.status, SystemStatus::Unhealthy);
        assert!(health.recommendations.iter().any(|r| r.contains("not closed")));

        let diagnostics = Diagnostics::assess(service, table);
        assert_eq!(
            diagnostics.potential_issues,
            vec![
                "Scoring service health is low (60.0)".to_string(),
                "Circuit breaker 'risk_model_service' is open".to_string(),
            ]
        );
        assert!(diagnostics
            .recommended_actions
            .iter()
            .any(|a| a.contains("Investigate the upstream service behind 'risk_model_service'")));
    }

    #[test]
    fn test_breaker_score_averages_states() {
        assert_eq!(breaker_score(&BTreeMap::new()), 100.0);
        let table = breakers(&[("a", false), ("b", true)]);
        assert_eq!(breaker_score(&table), 60.0);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(SystemStatus::from_score(90.0), SystemStatus::Healthy);
        assert_eq!(SystemStatus::from_score(75.0), SystemStatus::Degraded);
        assert_eq!(SystemStatus::from_score(50.0), SystemStatus::Unhealthy);
        assert_eq!(SystemStatus::from_score(49.9), SystemStatus::Critical);
    }
}
