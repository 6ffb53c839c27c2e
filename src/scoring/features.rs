//! Scoring input features.
//!
//! Features arrive as a loose JSON map of numbers and strings. The model
//! schema below fixes which keys are read and the default used when a key is
//! missing or has the wrong type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const TRANSACTION_COUNT: &str = "transaction_count";
pub const AVG_TRANSACTION_AMOUNT: &str = "avg_transaction_amount";
pub const CURRENT_CREDIT_LIMIT: &str = "current_credit_limit";
pub const AVG_VALENCE: &str = "avg_valence";
pub const AVG_AROUSAL: &str = "avg_arousal";
pub const LAST_EMOTION: &str = "last_emotion";

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view. Numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) if n.is_finite() => Some(*n),
            FeatureValue::Number(_) => None,
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            FeatureValue::Number(_) => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(n: f64) -> Self {
        FeatureValue::Number(n)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Text(s.to_string())
    }
}

/// Feature map keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(BTreeMap<String, FeatureValue>);

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<FeatureValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FeatureValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    /// Numeric value, `None` when missing or not numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(FeatureValue::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(FeatureValue::as_text)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FeatureValue>> FromIterator<(K, V)> for Features {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Kind of a schema entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureKind {
    Numeric(f64),
    Categorical(&'static str),
}

/// Expected model inputs with their defaults.
pub const FEATURE_SCHEMA: [(&str, FeatureKind); 6] = [
    (TRANSACTION_COUNT, FeatureKind::Numeric(0.0)),
    (AVG_TRANSACTION_AMOUNT, FeatureKind::Numeric(0.0)),
    (CURRENT_CREDIT_LIMIT, FeatureKind::Numeric(0.0)),
    (AVG_VALENCE, FeatureKind::Numeric(0.0)),
    (AVG_AROUSAL, FeatureKind::Numeric(0.0)),
    (LAST_EMOTION, FeatureKind::Categorical("neutral")),
];

/// Project `features` onto the schema, filling defaults.
pub fn normalize(features: &Features) -> Features {
    FEATURE_SCHEMA
        .iter()
        .map(|(key, kind)| {
            let value = match kind {
                FeatureKind::Numeric(default) => {
                    FeatureValue::Number(features.number(key).unwrap_or(*default))
                }
                FeatureKind::Categorical(default) => match features.get(key) {
                    Some(FeatureValue::Text(s)) => FeatureValue::Text(s.clone()),
                    Some(FeatureValue::Number(n)) => FeatureValue::Text(n.to_string()),
                    None => FeatureValue::Text((*default).to_string()),
                },
            };
            (key.to_string(), value)
        })
        .collect()
}
