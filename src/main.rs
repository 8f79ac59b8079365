// =============================================================================
// Chart Indicator Service — Main Entry Point
// =============================================================================
//
// Serves OHLC bars with computed technical indicators to the chart front end,
// plus a streamed chat relay.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod gemini;
mod indicators;
mod market_data;
mod service_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::service_config::ServiceConfig;

const CONFIG_PATH: &str = "service_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Chart Indicator Service starting up");

    let mut config = ServiceConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ServiceConfig::default()
    });
    config.apply_env();

    // ── 2. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    info!(chat_enabled = state.chat.is_some(), "application state ready");

    // ── 3. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received — stopping gracefully");
            }
        })
        .await
        .context("API server failed")?;

    info!("Chart Indicator Service shut down complete.");
    Ok(())
}
