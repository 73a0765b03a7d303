//! Shared application state for the srvmeter server.

use std::sync::Arc;

use srvmeter_core::error::Result;
use srvmeter_core::{MemoryRegistry, ServerMetricsRecorder};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<MemoryRegistry>,
    recorder: Option<Arc<ServerMetricsRecorder>>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        cfg.validate()?;

        let registry = Arc::new(MemoryRegistry::with_options(cfg.registry.options()));
        let recorder = if cfg.metrics.enabled {
            Some(Arc::new(ServerMetricsRecorder::with_name(
                registry.clone(),
                cfg.metrics.prefix.clone(),
                cfg.metrics.protocol.clone(),
            )))
        } else {
            tracing::info!("http server metrics disabled by config");
            None
        };

        Ok(Self {
            inner: Arc::new(AppStateInner { registry, recorder }),
        })
    }

    pub fn registry(&self) -> Arc<MemoryRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn recorder(&self) -> Option<Arc<ServerMetricsRecorder>> {
        self.inner.recorder.clone()
    }
}
