use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AppState;
use crate::health::diagnostics::{Diagnostics, SystemHealth};
use crate::health::report::HealthReport;
use crate::resilience::circuit_breaker::{BreakerMetrics, BreakerState, BreakerStatus};
use crate::resilience::registry::RegistryError;
use crate::scoring::features::Features;
use crate::scoring::model::{RiskModel, ScoringError};
use crate::scoring::service::{PerformanceSnapshot, RiskAssessment};

/// Errors returned to monitoring clients.
#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    Scoring(ScoringError),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        ApiError::Scoring(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Registry(err @ RegistryError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Scoring(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BreakerList {
    pub total: usize,
    pub circuit_breakers: BTreeMap<String, BreakerStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BreakerAction {
    pub name: String,
    pub action: String,
    pub state: BreakerState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoringMetrics {
    pub breaker_state: BreakerState,
    pub performance: PerformanceSnapshot,
    pub circuit_breaker: BreakerMetrics,
}

pub async fn get_system_health<M: RiskModel>(
    State(state): State<AppState<M>>,
) -> Json<SystemHealth> {
    Json(SystemHealth::assess(
        state.scoring.health_report(),
        state.registry.statuses(),
    ))
}

pub async fn get_breakers<M: RiskModel>(State(state): State<AppState<M>>) -> Json<BreakerList> {
    let circuit_breakers = state.registry.statuses();
    Json(BreakerList {
        total: circuit_breakers.len(),
        circuit_breakers,
    })
}

pub async fn get_breaker<M: RiskModel>(
    State(state): State<AppState<M>>,
    Path(name): Path<String>,
) -> Result<Json<BreakerStatus>, ApiError> {
    Ok(Json(state.registry.status(&name)?))
}

pub async fn reset_breaker<M: RiskModel>(
    State(state): State<AppState<M>>,
    Path(name): Path<String>,
) -> Result<Json<BreakerAction>, ApiError> {
    let breaker = state.registry.require(&name)?;
    breaker.reset();
    tracing::info!(breaker = %name, "Circuit breaker reset via monitoring API");
    Ok(Json(BreakerAction {
        name,
        action: "reset".to_string(),
        state: breaker.state(),
    }))
}

pub async fn open_breaker<M: RiskModel>(
    State(state): State<AppState<M>>,
    Path(name): Path<String>,
) -> Result<Json<BreakerAction>, ApiError> {
    let breaker = state.registry.require(&name)?;
    breaker.force_open();
    tracing::warn!(breaker = %name, "Circuit breaker forced open via monitoring API");
    Ok(Json(BreakerAction {
        name,
        action: "force_open".to_string(),
        state: breaker.state(),
    }))
}

pub async fn get_scoring_health<M: RiskModel>(
    State(state): State<AppState<M>>,
) -> Json<HealthReport> {
    Json(state.scoring.health_report())
}

pub async fn get_scoring_metrics<M: RiskModel>(
    State(state): State<AppState<M>>,
) -> Json<ScoringMetrics> {
    let status = state.scoring.breaker().status();
    Json(ScoringMetrics {
        breaker_state: status.state,
        performance: state.scoring.performance(),
        circuit_breaker: status.metrics,
    })
}

pub async fn get_diagnostics<M: RiskModel>(
    State(state): State<AppState<M>>,
) -> Json<Diagnostics> {
    Json(Diagnostics::assess(
        state.scoring.health_report(),
        state.registry.statuses(),
    ))
}

pub async fn score<M: RiskModel>(
    State(state): State<AppState<M>>,
    Json(features): Json<Features>,
) -> Result<Json<RiskAssessment>, ApiError> {
    Ok(Json(state.scoring.score_risk(&features).await?))
}
