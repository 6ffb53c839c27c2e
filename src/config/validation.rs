//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, rates within [0, 1])
//! - Validate bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("scoring.model.min_latency_ms ({min}) exceeds max_latency_ms ({max})")]
    LatencyRange { min: u64, max: u64 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn check_range(errors: &mut Vec<ValidationError>, field: &'static str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(ValidationError::OutOfRange { field, value, min, max });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let breaker = &config.breaker;
    if breaker.name.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "breaker.name" });
    }
    check_positive(&mut errors, "breaker.failure_threshold", breaker.failure_threshold.into());
    check_positive(&mut errors, "breaker.success_threshold", breaker.success_threshold.into());
    check_positive(&mut errors, "breaker.recovery_timeout_secs", breaker.recovery_timeout_secs);
    check_positive(&mut errors, "breaker.call_timeout_ms", breaker.call_timeout_ms);
    check_positive(&mut errors, "breaker.window_size", breaker.window_size as u64);

    let scoring = &config.scoring;
    check_range(&mut errors, "scoring.fallback_jitter", scoring.fallback_jitter, 0.0, 0.5);
    check_range(&mut errors, "scoring.model.failure_rate", scoring.model.failure_rate, 0.0, 1.0);
    check_range(&mut errors, "scoring.model.hang_rate", scoring.model.hang_rate, 0.0, 1.0);
    if scoring.model.min_latency_ms > scoring.model.max_latency_ms {
        errors.push(ValidationError::LatencyRange {
            min: scoring.model.min_latency_ms,
            max: scoring.model.max_latency_ms,
        });
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        check_positive(&mut errors, "admin.request_timeout_secs", config.admin.request_timeout_secs);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::Empty { field: "admin.api_key" });
        }
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.breaker.failure_threshold = 0;
        config.breaker.window_size = 0;
        config.scoring.model.failure_rate = 1.5;
        config.admin.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero { field: "breaker.failure_threshold" }));
        assert!(errors.contains(&ValidationError::Zero { field: "breaker.window_size" }));
    }

    #[test]
    fn test_latency_range_must_be_ordered() {
        let mut config = ServiceConfig::default();
        config.scoring.model.min_latency_ms = 900;
        config.scoring.model.max_latency_ms = 100;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::LatencyRange { min: 900, max: 100 }]);
    }

    #[test]
    fn test_disabled_admin_skips_address_check() {
        let mut config = ServiceConfig::default();
        config.admin.enabled = false;
        config.admin.bind_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
