//! Active metrics sink and the server customization hook.
//!
//! Connection hooks run inside axum's accept path, which carries no app
//! state, so the recorder they report to is installed process-wide here.

use std::sync::{Arc, RwLock};

use axum::{middleware, Router};
use srvmeter_core::HttpServerMetricsRecorder;

use crate::transport::layer::record_http;

static ACTIVE: RwLock<Option<Arc<dyn HttpServerMetricsRecorder>>> = RwLock::new(None);

/// Make `recorder` the active sink, replacing any previous one.
pub fn install(recorder: Arc<dyn HttpServerMetricsRecorder>) {
    // Poisoned lock: keep the previous sink rather than panic.
    if let Ok(mut g) = ACTIVE.write() {
        *g = Some(recorder);
    }
}

/// Clear the active sink; subsequent connections go unrecorded.
pub fn uninstall() {
    if let Ok(mut g) = ACTIVE.write() {
        *g = None;
    }
}

pub fn active() -> Option<Arc<dyn HttpServerMetricsRecorder>> {
    ACTIVE.read().ok().and_then(|g| g.clone())
}

/// Wire `recorder` into `router`: install it as the active sink and layer the
/// request middleware onto every route registered so far.
pub fn customize<S>(router: Router<S>, recorder: Arc<dyn HttpServerMetricsRecorder>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    install(Arc::clone(&recorder));
    tracing::info!("http server metrics enabled");
    router.route_layer(middleware::from_fn_with_state(recorder, record_http))
}
