//! Credit risk scoring.
//!
//! # Data Flow
//! ```text
//! Features (JSON map)
//!     → service.rs (breaker-protected call)
//!         → model.rs (primary risk model)
//!         → fallback.rs (rule-based scorer when the model is unhealthy)
//!     → RiskAssessment (score + source)
//! ```

pub mod fallback;
pub mod features;
pub mod model;
pub mod service;

pub use fallback::{FallbackScorer, RuleBasedScorer};
pub use features::{FeatureValue, Features};
pub use model::{RiskModel, ScoringError, SimulatedRiskModel};
pub use service::{
    PerformanceSnapshot, ProtectedScoringService, RiskAssessment, ScoreSource, EMERGENCY_SCORE,
};
