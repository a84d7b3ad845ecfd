//! DevForge · Submission Grading Backend
//!
//! - Axum HTTP + WebSocket API for grading lesson submissions
//! - Text-only evaluation: security denylist, structural syntax check,
//!   keyword/explicit predicates, points, badges and levels
//! - Static lesson UI fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   GRADER_RULES_PATH : path to TOML rule tables (optional, built-ins otherwise)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod pattern;
mod predicate;
mod domain;
mod gates;
mod scoring;
mod progression;
mod config;
mod seeds;
mod engine;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared, read-only grader built from the rule tables.
  let state = Arc::new(AppState::from_env()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "devforge_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "devforge_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "devforge_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
