// =============================================================================
// Aurora Session Engine — Main Entry Point
// =============================================================================
//
// Boots the multi-tenant equity-trading session engine: loads config, builds
// the shared AppState (Session table + Trading Manager + WebSocket fan-out),
// and serves the control-plane HTTP/WS surface. Sessions themselves are
// started on demand via the `/api/v1/sessions/start` endpoint — nothing is
// auto-started at boot.
// =============================================================================

mod api;
mod app_state;
mod broker;
mod config;
mod error;
mod executor;
mod indicators;
mod manager;
mod rate_limiter;
mod state;
mod strategy;
mod types;
mod ws;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::EngineConfig;

const CONFIG_PATH: &str = "engine_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Aurora Session Engine — Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load engine config, using defaults");
        EngineConfig::default()
    });

    info!(
        interval_seconds = config.interval_seconds,
        order_quantity = config.order_quantity,
        max_tokens = config.max_tokens,
        refill_rate = config.refill_rate,
        "engine configured"
    );

    let state = Arc::new(AppState::new(config));

    let bind_addr = std::env::var("AURORA_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind control-plane listener");
    info!(addr = %bind_addr, "control-plane API listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "control-plane server failed");
        }
    });

    info!("session engine running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("shutdown signal received — stopping active sessions");
        }
        _ = server => {
            warn!("control-plane server exited unexpectedly");
        }
    }

    for session_id in state.manager.get_active_session_ids() {
        state.manager.stop_session(session_id);
    }

    if let Err(e) = state.config.save(CONFIG_PATH) {
        error!(error = %e, "failed to save engine config on shutdown");
    }

    info!("aurora session engine shut down complete.");
    Ok(())
}
