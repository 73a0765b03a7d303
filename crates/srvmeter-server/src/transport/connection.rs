use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use srvmeter_core::HttpServerMetricsRecorder;

use crate::sink;

/// Per-connection info attached to every request on that connection.
///
/// Built once at accept time. When the last clone drops (the connection's
/// service and all in-flight requests are gone) the connection is reported
/// closed.
#[derive(Clone)]
pub struct ConnMeta {
    pub remote: SocketAddr,
    pub local: Option<SocketAddr>,
    guard: Option<Arc<ConnectionGuard>>,
}

struct ConnectionGuard {
    recorder: Arc<dyn HttpServerMetricsRecorder>,
    local: SocketAddr,
    in_flight: AtomicUsize,
}

impl ConnectionGuard {
    fn open(recorder: Arc<dyn HttpServerMetricsRecorder>, local: SocketAddr) -> Self {
        recorder.record_server_connection_opened(&local);
        Self {
            recorder,
            local,
            in_flight: AtomicUsize::new(0),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.recorder.record_server_connection_closed(&self.local);
    }
}

/// One request in flight on a metered connection.
///
/// The connection is active while at least one of these is alive.
pub(crate) struct InFlight(Arc<ConnectionGuard>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.recorder.record_server_connection_inactive(&self.0.local);
        }
    }
}

impl ConnMeta {
    pub fn new(remote: SocketAddr, local: Option<SocketAddr>) -> Self {
        let guard = match (sink::active(), local) {
            (Some(recorder), Some(local)) => Some(Arc::new(ConnectionGuard::open(recorder, local))),
            _ => None,
        };
        Self { remote, local, guard }
    }

    /// Mark a request as started. `None` when the connection is not metered.
    pub(crate) fn begin_request(&self) -> Option<InFlight> {
        let guard = self.guard.as_ref()?;
        if guard.in_flight.fetch_add(1, Ordering::AcqRel) == 0 {
            guard.recorder.record_server_connection_active(&guard.local);
        }
        Some(InFlight(Arc::clone(guard)))
    }
}

impl Connected<IncomingStream<'_>> for ConnMeta {
    fn connect_info(target: IncomingStream<'_>) -> Self {
        let local = match target.local_addr() {
            Ok(a) => Some(a),
            Err(e) => {
                tracing::debug!(error=%e, "local address unavailable; connection not metered");
                None
            }
        };
        ConnMeta::new(target.remote_addr(), local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srvmeter_core::ServerMetricsRecorder;
    use srvmeter_core::MemoryRegistry;

    fn guarded() -> (Arc<ServerMetricsRecorder>, ConnMeta) {
        let rec = Arc::new(ServerMetricsRecorder::new(Arc::new(MemoryRegistry::new())));
        let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let guard = ConnectionGuard::open(rec.clone(), local);
        let meta = ConnMeta {
            remote: "127.0.0.1:50000".parse().unwrap(),
            local: Some(local),
            guard: Some(Arc::new(guard)),
        };
        (rec, meta)
    }

    #[test]
    fn idle_connection_is_open_but_inactive() {
        let (rec, meta) = guarded();
        assert_eq!(rec.total_connections(), 1);
        assert_eq!(rec.active_connections(), 0);

        let req = meta.begin_request();
        assert_eq!(rec.active_connections(), 1);
        drop(req);
        assert_eq!(rec.active_connections(), 0);
        assert_eq!(rec.total_connections(), 1);

        drop(meta);
        assert_eq!(rec.total_connections(), 0);
    }

    #[test]
    fn overlapping_requests_count_the_connection_once() {
        let (rec, meta) = guarded();
        let a = meta.begin_request();
        let b = meta.clone().begin_request();
        assert_eq!(rec.active_connections(), 1);
        drop(a);
        assert_eq!(rec.active_connections(), 1);
        drop(b);
        assert_eq!(rec.active_connections(), 0);
    }

    #[test]
    fn unmetered_connection_has_no_requests() {
        let meta = ConnMeta {
            remote: "127.0.0.1:50000".parse().unwrap(),
            local: None,
            guard: None,
        };
        assert!(meta.begin_request().is_none());
    }
}
