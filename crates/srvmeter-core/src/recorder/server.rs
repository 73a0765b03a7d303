use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::address::{format_socket_address, host_only};
use crate::catalog::{MeterFamily, DEFAULT_PREFIX, PROTOCOL_HTTP};
use crate::error::{MeterError, Result};
use crate::registry::{Adder, Counter, DistributionSummary, Meter, MeterId, Registry, Timer};

use super::cache::InstrumentCache;
use super::key::MeterKey;
use super::{ChannelMetricsRecorder, HttpServerMetricsRecorder};

/// Server-side recorder.
///
/// Owns one [`InstrumentCache`] per family. The three gauge families share
/// process-wide adders; each newly seen address registers one more gauge
/// reading the same adder.
pub struct ServerMetricsRecorder {
    name: String,
    protocol: String,
    registry: Arc<dyn Registry>,

    active_connections: Arc<Adder>,
    active_streams: Arc<Adder>,
    total_connections: Arc<Adder>,

    active_connections_cache: InstrumentCache<String, Arc<Adder>>,
    active_streams_cache: InstrumentCache<String, Arc<Adder>>,
    total_connections_cache: InstrumentCache<String, Arc<Adder>>,
    data_received_cache: InstrumentCache<String, DistributionSummary>,
    data_received_time_cache: InstrumentCache<MeterKey, Timer>,
    data_sent_cache: InstrumentCache<String, DistributionSummary>,
    data_sent_time_cache: InstrumentCache<MeterKey, Timer>,
    errors_cache: InstrumentCache<String, Counter>,
    response_time_cache: InstrumentCache<MeterKey, Timer>,
    tls_handshake_time_cache: InstrumentCache<MeterKey, Timer>,
}

/// Registry no-op handles become `None`.
fn filter<M: Meter>(meter: M) -> Option<M> {
    if meter.is_noop() {
        None
    } else {
        Some(meter)
    }
}

impl ServerMetricsRecorder {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self::with_name(registry, DEFAULT_PREFIX, PROTOCOL_HTTP)
    }

    /// `name` prefixes every meter name; `protocol` is the `uri` tag value of
    /// the connection and stream gauges.
    pub fn with_name(registry: Arc<dyn Registry>, name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            registry,
            active_connections: Arc::new(Adder::new()),
            active_streams: Arc::new(Adder::new()),
            total_connections: Arc::new(Adder::new()),
            active_connections_cache: InstrumentCache::new(),
            active_streams_cache: InstrumentCache::new(),
            total_connections_cache: InstrumentCache::new(),
            data_received_cache: InstrumentCache::new(),
            data_received_time_cache: InstrumentCache::new(),
            data_sent_cache: InstrumentCache::new(),
            data_sent_time_cache: InstrumentCache::new(),
            errors_cache: InstrumentCache::new(),
            response_time_cache: InstrumentCache::new(),
            tls_handshake_time_cache: InstrumentCache::new(),
        }
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.value()
    }

    pub fn active_streams(&self) -> i64 {
        self.active_streams.value()
    }

    pub fn total_connections(&self) -> i64 {
        self.total_connections.value()
    }

    fn meter_id(&self, family: MeterFamily, values: &[&str]) -> MeterId {
        MeterId::new(family.meter_name(&self.name), family.kind(), family.bind(values))
            .with_base_unit(family.base_unit())
            .with_description(family.descriptor().description)
    }

    pub fn response_time_timer(&self, uri: &str, method: &str, status: &str) -> Option<Timer> {
        let key = MeterKey::new(Some(uri), None, Some(method), Some(status));
        self.response_time_cache.get_or_register(key, |_| {
            filter(self.registry.timer(self.meter_id(MeterFamily::ResponseTime, &[uri, method, status])))
        })
    }

    pub fn data_received_time_timer(&self, uri: &str, method: &str) -> Option<Timer> {
        let key = MeterKey::new(Some(uri), None, Some(method), None);
        self.data_received_time_cache.get_or_register(key, |_| {
            filter(self.registry.timer(self.meter_id(MeterFamily::DataReceivedTime, &[uri, method])))
        })
    }

    pub fn data_sent_time_timer(&self, uri: &str, method: &str, status: &str) -> Option<Timer> {
        let key = MeterKey::new(Some(uri), None, Some(method), Some(status));
        self.data_sent_time_cache.get_or_register(key, |_| {
            filter(self.registry.timer(self.meter_id(MeterFamily::DataSentTime, &[uri, method, status])))
        })
    }

    /// `address` is already reduced to host-only.
    pub fn tls_handshake_timer(&self, address: &str, status: &str) -> Option<Timer> {
        let key = MeterKey::new(None, Some(address), None, Some(status));
        self.tls_handshake_time_cache.get_or_register(key, |_| {
            filter(self.registry.timer(self.meter_id(MeterFamily::TlsHandshakeTime, &[address, status])))
        })
    }

    pub fn data_received_summary(&self, uri: &str) -> Option<DistributionSummary> {
        self.data_received_cache.get_or_register(uri.to_string(), |_| {
            filter(self.registry.summary(self.meter_id(MeterFamily::DataReceived, &[uri])))
        })
    }

    pub fn data_sent_summary(&self, uri: &str) -> Option<DistributionSummary> {
        self.data_sent_cache.get_or_register(uri.to_string(), |_| {
            filter(self.registry.summary(self.meter_id(MeterFamily::DataSent, &[uri])))
        })
    }

    pub fn errors_counter(&self, uri: &str) -> Option<Counter> {
        self.errors_cache.get_or_register(uri.to_string(), |_| {
            filter(self.registry.counter(self.meter_id(MeterFamily::Errors, &[uri])))
        })
    }

    /// Resolve the shared adder for `address`, registering this address's
    /// gauge over it on first sight.
    fn gauge_adder(
        &self,
        cache: &InstrumentCache<String, Arc<Adder>>,
        family: MeterFamily,
        adder: &Arc<Adder>,
        address: &SocketAddr,
    ) -> Option<Arc<Adder>> {
        let address = format_socket_address(address);
        cache.get_or_register(address, |address| {
            let id = self.meter_id(family, &[self.protocol.as_str(), address.as_str()]);
            filter(self.registry.gauge(id, Arc::clone(adder))).map(|_| Arc::clone(adder))
        })
    }

    fn total_connections_adder(&self, server_address: &SocketAddr) -> Option<Arc<Adder>> {
        self.gauge_adder(
            &self.total_connections_cache,
            MeterFamily::ConnectionsTotal,
            &self.total_connections,
            server_address,
        )
    }

    fn active_connections_adder(&self, local_address: &SocketAddr) -> Option<Arc<Adder>> {
        self.gauge_adder(
            &self.active_connections_cache,
            MeterFamily::ConnectionsActive,
            &self.active_connections,
            local_address,
        )
    }

    fn active_streams_adder(&self, local_address: &SocketAddr) -> Option<Arc<Adder>> {
        self.gauge_adder(
            &self.active_streams_cache,
            MeterFamily::StreamsActive,
            &self.active_streams,
            local_address,
        )
    }
}

impl ChannelMetricsRecorder for ServerMetricsRecorder {
    fn record_data_received(&self, _remote_address: &SocketAddr, _bytes: u64) {
        // noop: the server always reports with a URI
    }

    fn record_data_sent(&self, _remote_address: &SocketAddr, _bytes: u64) {
        // noop
    }

    fn increment_errors_count(&self, _remote_address: &SocketAddr) {
        // noop
    }

    fn record_tls_handshake_time(&self, remote_address: &SocketAddr, time: Duration, status: &str) {
        let formatted = format_socket_address(remote_address);
        if let Some(timer) = self.tls_handshake_timer(host_only(&formatted), status) {
            timer.record(time);
        }
    }

    fn record_connect_time(&self, _remote_address: &SocketAddr, _time: Duration, _status: &str) -> Result<()> {
        Err(MeterError::Unsupported("connect time"))
    }

    fn record_resolve_address_time(
        &self,
        _remote_address: &SocketAddr,
        _time: Duration,
        _status: &str,
    ) -> Result<()> {
        Err(MeterError::Unsupported("address resolution time"))
    }
}

impl HttpServerMetricsRecorder for ServerMetricsRecorder {
    fn record_uri_data_received(&self, _remote_address: &SocketAddr, uri: &str, bytes: u64) {
        if let Some(summary) = self.data_received_summary(uri) {
            summary.record(bytes);
        }
    }

    fn record_uri_data_sent(&self, _remote_address: &SocketAddr, uri: &str, bytes: u64) {
        if let Some(summary) = self.data_sent_summary(uri) {
            summary.record(bytes);
        }
    }

    fn increment_uri_errors_count(&self, _remote_address: &SocketAddr, uri: &str) {
        if let Some(counter) = self.errors_counter(uri) {
            counter.increment();
        }
    }

    fn record_data_received_time(&self, uri: &str, method: &str, time: Duration) {
        if let Some(timer) = self.data_received_time_timer(uri, method) {
            timer.record(time);
        }
    }

    fn record_data_sent_time(&self, uri: &str, method: &str, status: &str, time: Duration) {
        if let Some(timer) = self.data_sent_time_timer(uri, method, status) {
            timer.record(time);
        }
    }

    fn record_response_time(&self, uri: &str, method: &str, status: &str, time: Duration) {
        if let Some(timer) = self.response_time_timer(uri, method, status) {
            timer.record(time);
        }
    }

    fn record_server_connection_opened(&self, server_address: &SocketAddr) {
        if let Some(adder) = self.total_connections_adder(server_address) {
            adder.increment();
        }
    }

    fn record_server_connection_closed(&self, server_address: &SocketAddr) {
        if let Some(adder) = self.total_connections_adder(server_address) {
            adder.decrement();
        }
    }

    fn record_server_connection_active(&self, local_address: &SocketAddr) {
        if let Some(adder) = self.active_connections_adder(local_address) {
            adder.increment();
        }
    }

    fn record_server_connection_inactive(&self, local_address: &SocketAddr) {
        if let Some(adder) = self.active_connections_adder(local_address) {
            adder.decrement();
        }
    }

    fn record_stream_opened(&self, local_address: &SocketAddr) {
        if let Some(adder) = self.active_streams_adder(local_address) {
            adder.increment();
        }
    }

    fn record_stream_closed(&self, local_address: &SocketAddr) {
        if let Some(adder) = self.active_streams_adder(local_address) {
            adder.decrement();
        }
    }
}
