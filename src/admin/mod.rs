//! Monitoring API.
//!
//! # Routes
//! ```text
//! GET  /monitoring/health                          system health
//! GET  /monitoring/circuit-breakers                every breaker status
//! GET  /monitoring/circuit-breakers/{name}         one breaker status
//! POST /monitoring/circuit-breakers/{name}/reset   force closed
//! POST /monitoring/circuit-breakers/{name}/open    force open
//! GET  /monitoring/scoring/health                  scoring health report
//! GET  /monitoring/scoring/metrics                 scoring performance
//! GET  /monitoring/diagnostics                     issues and actions
//! POST /score                                      score a feature map
//! ```
//!
//! Every route requires `Authorization: Bearer <api_key>`, `/monitoring/health`
//! included. There is no unauthenticated liveness route.

pub mod auth;
pub mod handlers;
pub mod request_id;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use self::request_id::UuidRequestId;
use crate::config::AdminConfig;
use crate::lifecycle::Shutdown;
use crate::resilience::registry::BreakerRegistry;
use crate::scoring::model::RiskModel;
use crate::scoring::service::ProtectedScoringService;

/// State shared by every monitoring handler.
pub struct AppState<M: RiskModel> {
    pub registry: Arc<BreakerRegistry>,
    pub scoring: Arc<ProtectedScoringService<M>>,
}

impl<M: RiskModel> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            scoring: self.scoring.clone(),
        }
    }
}

/// Build the monitoring router with auth, request IDs, tracing and timeouts.
#[allow(deprecated)]
pub fn setup_admin_router<M: RiskModel>(state: AppState<M>, config: &AdminConfig) -> Router {
    let api_key: Arc<str> = Arc::from(config.api_key.as_str());

    Router::new()
        .route("/monitoring/health", get(get_system_health::<M>))
        .route("/monitoring/circuit-breakers", get(get_breakers::<M>))
        .route("/monitoring/circuit-breakers/{name}", get(get_breaker::<M>))
        .route(
            "/monitoring/circuit-breakers/{name}/reset",
            post(reset_breaker::<M>),
        )
        .route(
            "/monitoring/circuit-breakers/{name}/open",
            post(open_breaker::<M>),
        )
        .route("/monitoring/scoring/health", get(get_scoring_health::<M>))
        .route("/monitoring/scoring/metrics", get(get_scoring_metrics::<M>))
        .route("/monitoring/diagnostics", get(get_diagnostics::<M>))
        .route("/score", post(score::<M>))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

/// Serve the monitoring API until a shutdown signal arrives.
pub async fn run_admin_server(
    listener: TcpListener,
    router: Router,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Monitoring API starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("Monitoring API stopped");
    Ok(())
}
