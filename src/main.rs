//! Credit Scoring Resilience Service
//!
//! Serves breaker-protected risk scoring and the monitoring API.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /score ─────▶ ProtectedScoringService ──▶ CircuitBreaker ──▶ RiskModel
//!                                 │                        │
//!                                 │ fallback               │ outcomes
//!                                 ▼                        ▼
//!                         RuleBasedScorer            MetricsWindow
//!
//!     GET /monitoring/* ──▶ BreakerRegistry + health reports
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use credit_resilience::admin::{run_admin_server, setup_admin_router, AppState};
use credit_resilience::config::{load_config, ServiceConfig};
use credit_resilience::lifecycle::{signals, Shutdown};
use credit_resilience::observability::{logging, metrics};
use credit_resilience::resilience::BreakerRegistry;
use credit_resilience::scoring::{ProtectedScoringService, SimulatedRiskModel};

#[derive(Parser)]
#[command(name = "credit-resilience")]
#[command(about = "Circuit-breaker protected credit risk scoring", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("credit-resilience v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.admin.bind_address,
        breaker = %config.breaker.name,
        failure_threshold = config.breaker.failure_threshold,
        recovery_timeout_secs = config.breaker.recovery_timeout_secs,
        call_timeout_ms = config.breaker.call_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(BreakerRegistry::new());
    let model = SimulatedRiskModel::new(config.scoring.model.clone());
    let scoring = Arc::new(ProtectedScoringService::from_config(
        model, &registry, &config,
    ));

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    if !config.admin.enabled {
        tracing::warn!("Monitoring API disabled, waiting for shutdown signal");
        shutdown.wait().await;
        return Ok(());
    }

    if config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
        tracing::warn!("Monitoring API is using the placeholder API key");
    }

    let state = AppState { registry, scoring };
    let router = setup_admin_router(state, &config.admin);
    let listener = TcpListener::bind(&config.admin.bind_address).await?;

    run_admin_server(listener, router, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
