//! Metric catalog: canonical names, tag-key shapes and kinds.
//!
//! Pure static data. Every family owns one [`MeterDescriptor`]; the tag-key
//! slice order is the order values are bound in at registration time, so the
//! same logical key always produces the same tag list.

use serde::Serialize;

/// Tag key carrying the request URI (or the protocol, for connection gauges).
pub const URI: &str = "uri";
pub const METHOD: &str = "method";
pub const STATUS: &str = "status";
pub const REMOTE_ADDRESS: &str = "remote.address";
pub const LOCAL_ADDRESS: &str = "local.address";

/// Default meter name prefix.
pub const DEFAULT_PREFIX: &str = "srvmeter.http.server";
/// Value of the `uri` tag on connection/stream gauges.
pub const PROTOCOL_HTTP: &str = "http";

/// Instrument kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    Counter,
    Gauge,
    Timer,
    DistributionSummary,
}

impl MeterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MeterKind::Counter => "counter",
            MeterKind::Gauge => "gauge",
            MeterKind::Timer => "timer",
            MeterKind::DistributionSummary => "distribution_summary",
        }
    }
}

/// Static metadata for one family.
#[derive(Debug)]
pub struct MeterDescriptor {
    /// Appended to the recorder prefix to form the meter name.
    pub suffix: &'static str,
    pub kind: MeterKind,
    pub tag_keys: &'static [&'static str],
    pub base_unit: Option<&'static str>,
    pub description: &'static str,
}

/// Every family the server recorder registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterFamily {
    ConnectionsActive,
    ConnectionsTotal,
    StreamsActive,
    DataReceived,
    DataReceivedTime,
    DataSent,
    DataSentTime,
    ResponseTime,
    Errors,
    TlsHandshakeTime,
}

static CONNECTIONS_ACTIVE: MeterDescriptor = MeterDescriptor {
    suffix: ".connections.active",
    kind: MeterKind::Gauge,
    tag_keys: &[URI, LOCAL_ADDRESS],
    base_unit: None,
    description: "The number of http connections, on the server, currently processing requests.",
};

static CONNECTIONS_TOTAL: MeterDescriptor = MeterDescriptor {
    suffix: ".connections.total",
    kind: MeterKind::Gauge,
    tag_keys: &[URI, LOCAL_ADDRESS],
    base_unit: None,
    description: "The number of all opened connections on the server.",
};

static STREAMS_ACTIVE: MeterDescriptor = MeterDescriptor {
    suffix: ".streams.active",
    kind: MeterKind::Gauge,
    tag_keys: &[URI, LOCAL_ADDRESS],
    base_unit: None,
    description: "The number of HTTP/2 streams currently active on the server.",
};

static DATA_RECEIVED: MeterDescriptor = MeterDescriptor {
    suffix: ".data.received",
    kind: MeterKind::DistributionSummary,
    tag_keys: &[URI],
    base_unit: Some("bytes"),
    description: "Amount of the data received, in bytes.",
};

static DATA_RECEIVED_TIME: MeterDescriptor = MeterDescriptor {
    suffix: ".data.received.time",
    kind: MeterKind::Timer,
    tag_keys: &[URI, METHOD],
    base_unit: None,
    description: "Time spent in consuming incoming data on the server.",
};

static DATA_SENT: MeterDescriptor = MeterDescriptor {
    suffix: ".data.sent",
    kind: MeterKind::DistributionSummary,
    tag_keys: &[URI],
    base_unit: Some("bytes"),
    description: "Amount of the data sent, in bytes.",
};

static DATA_SENT_TIME: MeterDescriptor = MeterDescriptor {
    suffix: ".data.sent.time",
    kind: MeterKind::Timer,
    tag_keys: &[URI, METHOD, STATUS],
    base_unit: None,
    description: "Time spent in sending outgoing data from the server.",
};

static RESPONSE_TIME: MeterDescriptor = MeterDescriptor {
    suffix: ".response.time",
    kind: MeterKind::Timer,
    tag_keys: &[URI, METHOD, STATUS],
    base_unit: None,
    description: "Total time for the request/response.",
};

static ERRORS: MeterDescriptor = MeterDescriptor {
    suffix: ".errors",
    kind: MeterKind::Counter,
    tag_keys: &[URI],
    base_unit: None,
    description: "Number of errors that occurred.",
};

static TLS_HANDSHAKE_TIME: MeterDescriptor = MeterDescriptor {
    suffix: ".tls.handshake.time",
    kind: MeterKind::Timer,
    tag_keys: &[REMOTE_ADDRESS, STATUS],
    base_unit: None,
    description: "Time spent for TLS handshake.",
};

impl MeterFamily {
    pub const ALL: [MeterFamily; 10] = [
        MeterFamily::ConnectionsActive,
        MeterFamily::ConnectionsTotal,
        MeterFamily::StreamsActive,
        MeterFamily::DataReceived,
        MeterFamily::DataReceivedTime,
        MeterFamily::DataSent,
        MeterFamily::DataSentTime,
        MeterFamily::ResponseTime,
        MeterFamily::Errors,
        MeterFamily::TlsHandshakeTime,
    ];

    pub fn descriptor(self) -> &'static MeterDescriptor {
        match self {
            MeterFamily::ConnectionsActive => &CONNECTIONS_ACTIVE,
            MeterFamily::ConnectionsTotal => &CONNECTIONS_TOTAL,
            MeterFamily::StreamsActive => &STREAMS_ACTIVE,
            MeterFamily::DataReceived => &DATA_RECEIVED,
            MeterFamily::DataReceivedTime => &DATA_RECEIVED_TIME,
            MeterFamily::DataSent => &DATA_SENT,
            MeterFamily::DataSentTime => &DATA_SENT_TIME,
            MeterFamily::ResponseTime => &RESPONSE_TIME,
            MeterFamily::Errors => &ERRORS,
            MeterFamily::TlsHandshakeTime => &TLS_HANDSHAKE_TIME,
        }
    }

    pub fn kind(self) -> MeterKind {
        self.descriptor().kind
    }

    pub fn tag_keys(self) -> &'static [&'static str] {
        self.descriptor().tag_keys
    }

    pub fn base_unit(self) -> Option<&'static str> {
        self.descriptor().base_unit
    }

    /// Resolve the name template against a recorder prefix.
    pub fn meter_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.descriptor().suffix)
    }

    /// Pair tag keys with `values`, in catalog order.
    ///
    /// `values` must be given in the same order as [`MeterFamily::tag_keys`].
    /// Surplus values are ignored; missing values are bound as empty strings.
    pub fn bind(self, values: &[&str]) -> Vec<(String, String)> {
        debug_assert_eq!(values.len(), self.tag_keys().len(), "tag arity for {self:?}");
        self.tag_keys()
            .iter()
            .enumerate()
            .map(|(i, k)| (k.to_string(), values.get(i).copied().unwrap_or("").to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_against_prefix() {
        assert_eq!(
            MeterFamily::DataReceived.meter_name("com.example"),
            "com.example.data.received"
        );
        assert_eq!(
            MeterFamily::TlsHandshakeTime.meter_name(DEFAULT_PREFIX),
            "srvmeter.http.server.tls.handshake.time"
        );
    }

    #[test]
    fn bind_is_stable_and_ordered() {
        let a = MeterFamily::ResponseTime.bind(&["/x", "GET", "200"]);
        let b = MeterFamily::ResponseTime.bind(&["/x", "GET", "200"]);
        assert_eq!(a, b);
        let keys: Vec<&str> = a.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec![URI, METHOD, STATUS]);
    }

    #[test]
    fn only_byte_families_carry_a_unit() {
        for f in MeterFamily::ALL {
            let expect = matches!(f, MeterFamily::DataReceived | MeterFamily::DataSent);
            assert_eq!(f.base_unit().is_some(), expect, "{f:?}");
        }
    }

    #[test]
    fn gauges_are_keyed_by_local_address() {
        for f in [
            MeterFamily::ConnectionsActive,
            MeterFamily::ConnectionsTotal,
            MeterFamily::StreamsActive,
        ] {
            assert_eq!(f.kind(), MeterKind::Gauge);
            assert_eq!(f.tag_keys(), &[URI, LOCAL_ADDRESS]);
        }
    }
}
