// =============================================================================
// Meridian Scanner — Main Entry Point
// =============================================================================
//
// Daily end-of-day stock scanner: fetches OHLCV history from EODHD, runs the
// volatility-squeeze and volume-spike detectors over each market's symbol
// universe, and serves results over a REST API. Scans run on demand or on a
// daily schedule.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod detectors;
mod indicators;
mod market_data;
mod runtime_config;
mod scan;
mod scheduler;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::EodhdClient;
use crate::runtime_config::RuntimeConfig;
use crate::store::CurationStore;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Meridian Scanner — Starting Up                    ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config
        .scan_params
        .validate()
        .context("persisted scan parameters are invalid")?;

    info!(
        markets = ?crate::types::Market::ALL,
        max_concurrent_fetches = config.max_concurrent_fetches,
        scheduled = config.enable_scheduled_scans,
        "Configuration loaded"
    );

    // ── 2. Data provider ─────────────────────────────────────────────────
    let api_token =
        std::env::var("EODHD_API_KEY").context("EODHD_API_KEY must be set")?;
    let eodhd = Arc::new(EodhdClient::new(api_token));

    // ── 3. Curation overlay ──────────────────────────────────────────────
    let curation = Arc::new(
        CurationStore::load(&config.curation_path)
            .context("failed to load curation overlay")?,
    );
    info!(
        excluded = curation.excluded().len(),
        saved = curation.saved().len(),
        "Curation overlay loaded"
    );

    // ── 4. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config,
        CONFIG_PATH.to_string(),
        eodhd.clone(),
        eodhd,
        curation,
    ));

    // ── 5. API server ────────────────────────────────────────────────────
    let bind_addr =
        std::env::var("MERIDIAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let api_state = state.clone();
    let api_bind = bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&api_bind)
            .await
            .expect("Failed to bind API server");
        info!(addr = %api_bind, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 6. Scheduler ─────────────────────────────────────────────────────
    let sched_state = state.clone();
    tokio::spawn(async move {
        scheduler::run_scheduler(sched_state).await;
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Meridian Scanner shut down complete.");
    Ok(())
}
