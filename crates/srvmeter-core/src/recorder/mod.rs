//! Recorder contracts and the server-side recorder.
//!
//! [`ChannelMetricsRecorder`] is the transport-level surface shared with
//! client recorders; [`HttpServerMetricsRecorder`] adds the HTTP server
//! lifecycle events. Every method is safe to call from any thread.

pub mod cache;
pub mod key;
pub mod server;

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Result;

pub use cache::InstrumentCache;
pub use key::MeterKey;
pub use server::ServerMetricsRecorder;

/// Transport-level events.
pub trait ChannelMetricsRecorder: Send + Sync {
    /// Bytes received without URI context.
    fn record_data_received(&self, remote_address: &SocketAddr, bytes: u64);
    /// Bytes sent without URI context.
    fn record_data_sent(&self, remote_address: &SocketAddr, bytes: u64);
    /// Error without URI context.
    fn increment_errors_count(&self, remote_address: &SocketAddr);
    fn record_tls_handshake_time(&self, remote_address: &SocketAddr, time: Duration, status: &str);
    /// Client-side only.
    fn record_connect_time(&self, remote_address: &SocketAddr, time: Duration, status: &str) -> Result<()>;
    /// Client-side only.
    fn record_resolve_address_time(
        &self,
        remote_address: &SocketAddr,
        time: Duration,
        status: &str,
    ) -> Result<()>;
}

/// HTTP server lifecycle events.
pub trait HttpServerMetricsRecorder: ChannelMetricsRecorder {
    fn record_uri_data_received(&self, remote_address: &SocketAddr, uri: &str, bytes: u64);
    fn record_uri_data_sent(&self, remote_address: &SocketAddr, uri: &str, bytes: u64);
    fn increment_uri_errors_count(&self, remote_address: &SocketAddr, uri: &str);

    fn record_data_received_time(&self, uri: &str, method: &str, time: Duration);
    fn record_data_sent_time(&self, uri: &str, method: &str, status: &str, time: Duration);
    fn record_response_time(&self, uri: &str, method: &str, status: &str, time: Duration);

    fn record_server_connection_opened(&self, server_address: &SocketAddr);
    fn record_server_connection_closed(&self, server_address: &SocketAddr);
    fn record_server_connection_active(&self, local_address: &SocketAddr);
    fn record_server_connection_inactive(&self, local_address: &SocketAddr);
    fn record_stream_opened(&self, local_address: &SocketAddr);
    fn record_stream_closed(&self, local_address: &SocketAddr);
}
