//! NVR Question Backend
//!
//! - Axum HTTP API (question generation, saved questions, bank, reviews)
//! - Optional Gemini integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   GEMINI_API_KEY  : enables question generation if present
//!   GEMINI_BASE_URL : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL    : overrides [generation].model (default "gemini-2.5-pro")
//!   NVR_CONFIG_PATH : path to TOML config (prompts, generation, storage)
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use nvr_backend::config::AppConfig;
use nvr_backend::routes::build_router;
use nvr_backend::state::AppState;
use nvr_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::from_env();
  let state = Arc::new(AppState::from_config(&cfg).await);
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "nvr_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
