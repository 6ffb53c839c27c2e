//! Credit Scoring Resilience Library

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod scoring;

pub use config::schema::ServiceConfig;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerRegistry, CircuitBreaker};
pub use scoring::ProtectedScoringService;
