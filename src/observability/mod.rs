//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and the scoring service produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Breaker name is a field on every event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
