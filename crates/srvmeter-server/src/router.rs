//! Axum router wiring.
//!
//! Demo routes sit behind the metrics middleware; ops routes are added after
//! customization and are not metered.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use srvmeter_core::error::{MeterError, Result};
use srvmeter_core::HttpServerMetricsRecorder;

use crate::{app_state::AppState, ops, services, sink, transport::ConnMeta};

pub fn build_router(state: AppState) -> Router {
    let api: Router<AppState> = Router::new()
        .route("/echo", post(services::echo))
        .route("/items/:id", get(services::item))
        .route("/fail", get(services::fail));

    let api = match state.recorder() {
        Some(recorder) => {
            let recorder: Arc<dyn HttpServerMetricsRecorder> = recorder;
            sink::customize(api, recorder)
        }
        None => api,
    };

    api.route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .route("/metrics/json", get(ops::metrics_json))
        .with_state(state)
}

/// Serve `state`'s router on `listener` until the server stops.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<ConnMeta>())
        .await
        .map_err(|e| MeterError::Internal(format!("server failed: {e}")))
}
