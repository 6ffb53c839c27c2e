//! Named table of circuit breakers.
//!
//! # Responsibilities
//! - Register breakers once at startup
//! - Look up breakers by name for administration (reset, force open)
//! - Export every breaker's status for monitoring
//!
//! # Design Decisions
//! - Constructed once and shared via `Arc`; there is no global instance
//! - Backed by `DashMap` (concurrent reads, rare writes)
//! - Breakers are never removed
//! - Registering an existing name replaces the old entry (last write wins)

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::resilience::circuit_breaker::{BreakerConfig, BreakerStatus, CircuitBreaker};

/// Errors returned by registry lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("circuit breaker '{0}' not found")]
    NotFound(String),
}

/// Process-wide breaker table.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker under its own name, returning the shared handle.
    pub fn register(&self, breaker: CircuitBreaker) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(breaker);
        let name = breaker.name().to_string();
        if self.breakers.insert(name.clone(), breaker.clone()).is_some() {
            tracing::warn!(breaker = %name, "Replaced existing circuit breaker registration");
        } else {
            tracing::debug!(breaker = %name, "Registered circuit breaker");
        }
        breaker
    }

    /// Build and register a breaker in one step.
    pub fn create(&self, name: impl Into<String>, config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.register(CircuitBreaker::new(name, config))
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Like [`get`](Self::get) but fails with `NotFound`.
    pub fn require(&self, name: &str) -> Result<Arc<CircuitBreaker>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn status(&self, name: &str) -> Result<BreakerStatus, RegistryError> {
        Ok(self.require(name)?.status())
    }

    /// Status of every breaker, ordered by name.
    pub fn statuses(&self) -> BTreeMap<String, BreakerStatus> {
        self.breakers
            .iter()
            .map(|r| (r.key().clone(), r.value().status()))
            .collect()
    }

    pub fn reset(&self, name: &str) -> Result<(), RegistryError> {
        self.require(name)?.reset();
        Ok(())
    }

    pub fn force_open(&self, name: &str) -> Result<(), RegistryError> {
        self.require(name)?.force_open();
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::BreakerState;

    #[test]
    fn test_register_and_lookup() {
        let registry = BreakerRegistry::new();
        let cb = registry.create("scoring", BreakerConfig::default());
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&cb, &registry.get("scoring").unwrap()));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let registry = BreakerRegistry::new();
        assert_eq!(
            registry.reset("ghost"),
            Err(RegistryError::NotFound("ghost".into()))
        );
        assert_eq!(
            registry.force_open("ghost"),
            Err(RegistryError::NotFound("ghost".into()))
        );
        assert!(registry.status("ghost").is_err());
    }

    #[test]
    fn test_admin_operations_reach_shared_breaker() {
        let registry = BreakerRegistry::new();
        let cb = registry.create("scoring", BreakerConfig::default());

        registry.force_open("scoring").unwrap();
        assert_eq!(cb.state(), BreakerState::Open);

        registry.reset("scoring").unwrap();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let registry = BreakerRegistry::new();
        let first = registry.create("scoring", BreakerConfig::default());
        first.force_open();

        let second = registry.create("scoring", BreakerConfig::default());
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&second, &registry.get("scoring").unwrap()));
        assert_eq!(registry.status("scoring").unwrap().state, BreakerState::Closed);
    }

    #[test]
    fn test_statuses_sorted_by_name() {
        let registry = BreakerRegistry::new();
        registry.create("zeta", BreakerConfig::default());
        registry.create("alpha", BreakerConfig::default());

        let names: Vec<_> = registry.statuses().into_keys().collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(registry.names(), names);
    }
}
