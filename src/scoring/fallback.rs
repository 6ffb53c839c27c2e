//! Rule-based fallback scorer.
//!
//! Used whenever the primary model is blocked, failing or too slow. It reads
//! the same features as the model and combines independent adjustments on
//! top of a 0.4 base score:
//!
//! ```text
//! transaction volume   none +0.30 | <5 +0.20 | >100 -0.10
//! utilization          avg > 80% of limit +0.20 | avg < 30% of limit -0.10
//! existing limit       >100k -0.10 | <10k +0.10
//! emotional stress     valence < -0.3 and arousal > 0.7 +0.20
//!                      valence > 0.3 and arousal in [0.3, 0.7] -0.10
//! last emotion         anger/fear/sadness/stress +0.15
//!                      joy/contentment/calm/confident -0.10
//! jitter               uniform in [-j, +j]
//! ```
//!
//! The result is clamped to `[0, 1]` and rounded to three decimals.

use rand::Rng;

use crate::scoring::features::{self, Features};

const BASE_SCORE: f64 = 0.4;
const HIGH_RISK_EMOTIONS: [&str; 4] = ["anger", "fear", "sadness", "stress"];
const LOW_RISK_EMOTIONS: [&str; 4] = ["joy", "contentment", "calm", "confident"];

/// A last-resort scorer. Implementations should never panic; the scoring
/// service still guards against it.
pub trait FallbackScorer: Send + Sync + 'static {
    fn version(&self) -> &str;

    fn score(&self, features: &Features) -> f64;
}

/// Deterministic rule-based risk scorer plus bounded jitter.
#[derive(Debug, Clone, Copy)]
pub struct RuleBasedScorer {
    jitter: f64,
}

impl RuleBasedScorer {
    pub const VERSION: &'static str = "fallback_v1.0";

    /// `jitter` is the half-width of the random adjustment; 0 disables it.
    pub fn new(jitter: f64) -> Self {
        Self {
            jitter: jitter.abs(),
        }
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}

impl FallbackScorer for RuleBasedScorer {
    fn version(&self) -> &str {
        Self::VERSION
    }

    fn score(&self, features: &Features) -> f64 {
        let noise = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        let raw = BASE_SCORE + rule_adjustment(features) + noise;
        (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
    }
}

impl Default for RuleBasedScorer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

/// Sum of every rule adjustment, without base score or jitter.
pub fn rule_adjustment(features: &Features) -> f64 {
    let transaction_count = features.number(features::TRANSACTION_COUNT).unwrap_or(0.0);
    let avg_amount = features.number(features::AVG_TRANSACTION_AMOUNT).unwrap_or(0.0);
    let limit = features.number(features::CURRENT_CREDIT_LIMIT).unwrap_or(0.0);

    let mut adjustment = 0.0;

    if transaction_count == 0.0 {
        adjustment += 0.3;
    } else if transaction_count < 5.0 {
        adjustment += 0.2;
    } else if transaction_count > 100.0 {
        adjustment -= 0.1;
    }

    if avg_amount > limit * 0.8 {
        adjustment += 0.2;
    } else if avg_amount < limit * 0.3 {
        adjustment -= 0.1;
    }

    if limit > 100_000.0 {
        adjustment -= 0.1;
    } else if limit < 10_000.0 {
        adjustment += 0.1;
    }

    if let (Some(valence), Some(arousal)) = (
        features.number(features::AVG_VALENCE),
        features.number(features::AVG_AROUSAL),
    ) {
        if valence < -0.3 && arousal > 0.7 {
            adjustment += 0.2;
        } else if valence > 0.3 && (0.3..=0.7).contains(&arousal) {
            adjustment -= 0.1;
        }
    }

    if let Some(emotion) = features.text(features::LAST_EMOTION) {
        if HIGH_RISK_EMOTIONS.contains(&emotion) {
            adjustment += 0.15;
        } else if LOW_RISK_EMOTIONS.contains(&emotion) {
            adjustment -= 0.1;
        }
    }

    adjustment
}
