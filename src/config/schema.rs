//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Every section has defaults so a minimal (even empty) file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::{BreakerConfig, FailurePredicate};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Monitoring API settings.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Circuit breaker guarding the risk model.
    pub breaker: BreakerSettings,

    /// Risk scoring settings.
    pub scoring: ScoringConfig,
}

/// Monitoring API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the monitoring API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Bind address.
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Circuit breaker settings as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Registry name of the breaker.
    pub name: String,

    /// Closed-state failures before opening.
    pub failure_threshold: u32,

    /// Seconds to stay open before probing.
    pub recovery_timeout_secs: u64,

    /// Consecutive probe successes needed to close.
    pub success_threshold: u32,

    /// Deadline for one protected call in milliseconds.
    pub call_timeout_ms: u64,

    /// Capacity of the rolling outcome window.
    pub window_size: usize,
}

impl BreakerSettings {
    /// Runtime breaker config with the given failure predicate.
    pub fn to_breaker_config(&self, predicate: FailurePredicate) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            window_size: self.window_size,
            failure_predicate: predicate,
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: "risk_model_service".to_string(),
            failure_threshold: 3,
            recovery_timeout_secs: 30,
            success_threshold: 2,
            call_timeout_ms: 5000,
            window_size: 50,
        }
    }
}

/// Risk scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Half-width of the uniform jitter added by the rule-based scorer.
    pub fallback_jitter: f64,

    /// Simulated upstream model.
    pub model: SimulatedModelConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fallback_jitter: 0.05,
            model: SimulatedModelConfig::default(),
        }
    }
}

/// Behaviour of the simulated risk model used by the server binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatedModelConfig {
    /// Probability of an upstream error per call.
    pub failure_rate: f64,

    /// Probability that a call hangs past any reasonable deadline.
    pub hang_rate: f64,

    /// Lower bound of simulated inference latency.
    pub min_latency_ms: u64,

    /// Upper bound of simulated inference latency.
    pub max_latency_ms: u64,
}

impl Default for SimulatedModelConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.1,
            hang_rate: 0.0,
            min_latency_ms: 100,
            max_latency_ms: 500,
        }
    }
}
