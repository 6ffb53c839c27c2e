//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_calls_total` (counter): calls by breaker and outcome
//! - `breaker_call_duration_seconds` (histogram): latency of attempted calls
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `breaker_transitions_total` (counter): transitions by target state
//! - `scoring_predictions_total` (counter): predictions by source
//! - `scoring_health_score` (gauge): last computed health score
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are breaker name, outcome, state and score source

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::BreakerState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

fn state_value(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    }
}

/// Record one call outcome; `latency` is `None` for calls never attempted.
pub fn record_breaker_call(breaker: &str, outcome: &'static str, latency: Option<Duration>) {
    counter!("breaker_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
    if let Some(latency) = latency {
        histogram!("breaker_call_duration_seconds", "breaker" => breaker.to_string())
            .record(latency.as_secs_f64());
    }
}

pub fn record_breaker_state(breaker: &str, state: BreakerState) {
    gauge!("breaker_state", "breaker" => breaker.to_string()).set(state_value(state));
}

pub fn record_breaker_transition(breaker: &str, to: BreakerState) {
    counter!("breaker_transitions_total", "breaker" => breaker.to_string(), "to" => to.as_str())
        .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_prediction(source: &'static str) {
    counter!("scoring_predictions_total", "source" => source).increment(1);
}

pub fn record_health_score(score: f64) {
    gauge!("scoring_health_score").set(score);
}
