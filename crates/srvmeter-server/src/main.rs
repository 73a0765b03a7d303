//! srvmeter demo server.
//!
//! Usage: `srvmeter-server [config.yaml]` (default `srvmeter.yaml`).

use tracing_subscriber::{fmt, EnvFilter};

use srvmeter_core::error::{MeterError, Result};
use srvmeter_server::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error=%e, code=e.code(), "srvmeter-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "srvmeter.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;

    tracing::info!(%listen, "srvmeter-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MeterError::Internal(format!("failed to bind {listen}: {e}")))?;

    router::serve(listener, state).await
}
