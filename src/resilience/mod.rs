//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → circuit_breaker.rs (admit: closed / open / half-open probe)
//!     → timeouts.rs (enforce call deadline)
//!     → window.rs (record outcome, failure rates)
//!     → circuit_breaker.rs (state transition, fallback on failure)
//!
//! Administration:
//!     registry.rs (lookup by name → status / reset / force open)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every protected call has a deadline
//! - Breaker state lives in memory and resets on restart
//! - The registry is injected, never global

pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;
pub mod window;

pub use circuit_breaker::{
    BreakerConfig, BreakerError, BreakerState, BreakerStatus, CircuitBreaker, FailurePredicate,
};
pub use registry::{BreakerRegistry, RegistryError};
pub use window::MetricsWindow;
