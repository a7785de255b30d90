//! VoxRecord · Speech Data Collection Backend
//!
//! - Axum HTTP API (login, next task, recording upload, admin export)
//! - Deterministic task assignment against per-user recording history
//! - ffmpeg conversion of uploads to 16 kHz mono WAV
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 8000)
//!   RECORDER_CONFIG_PATH : path to TOML config (paths + quotas + CORS)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod corpus;
mod progress;
mod assign;
mod engine;
mod store;
mod audio;
mod error;
mod protocol;
mod state;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = config::load_settings_from_env();

  let ffmpeg_available = audio::ffmpeg_available().await;
  if !ffmpeg_available {
    warn!(target: "voxrecord_backend", "ffmpeg is not installed; audio conversion will fail");
  }

  // Build shared application state (corpus, fact store, task engine).
  let state = Arc::new(AppState::new(settings, ffmpeg_available)?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 8000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "voxrecord_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "voxrecord_backend", error = %e, "Failed to listen for shutdown signal");
    return;
  }
  info!(target: "voxrecord_backend", "Shutdown signal received");
}
