//! Health scoring subsystem.
//!
//! # Data Flow
//! ```text
//! Scoring service health (report.rs):
//!     Breaker status + facade performance
//!     → Penalty-based score (0-100)
//!     → Status bucket and recommendations
//!
//! System health (diagnostics.rs):
//!     Service report + every registered breaker
//!     → Weighted overall score
//!     → Potential issues and recommended actions
//! ```
//!
//! # Design Decisions
//! - Reports are derived on demand, never stored
//! - Scoring is pure arithmetic over snapshots

pub mod diagnostics;
pub mod report;

pub use diagnostics::{Diagnostics, SystemHealth, SystemStatus};
pub use report::{HealthReport, HealthStatus};
