use std::net::SocketAddr;

use serde::Deserialize;
use srvmeter_core::catalog::{DEFAULT_PREFIX, PROTOCOL_HTTP};
use srvmeter_core::error::{MeterError, Result};
use srvmeter_core::registry::memory::DEFAULT_MAX_SERIES_PER_METER;
use srvmeter_core::registry::RegistryOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub registry: RegistrySection,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MeterError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.metrics.validate()?;
        self.registry.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            MeterError::InvalidConfig(format!(
                "server.listen must be a valid socket address: {}",
                self.listen
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Meter name prefix, e.g. `srvmeter.http.server`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// `uri` tag value on connection and stream gauges.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            prefix: default_prefix(),
            protocol: default_protocol(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(MeterError::InvalidConfig(
                "metrics.prefix must be non-empty and contain no whitespace".into(),
            ));
        }
        if self.protocol.is_empty() {
            return Err(MeterError::InvalidConfig("metrics.protocol must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    #[serde(default = "default_max_series_per_meter")]
    pub max_series_per_meter: usize,

    /// Meter name prefixes that are never backed.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            max_series_per_meter: default_max_series_per_meter(),
            deny: Vec::new(),
        }
    }
}

impl RegistrySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100_000).contains(&self.max_series_per_meter) {
            return Err(MeterError::InvalidConfig(
                "registry.max_series_per_meter must be between 1 and 100000".into(),
            ));
        }
        if self.deny.iter().any(|p| p.is_empty()) {
            return Err(MeterError::InvalidConfig(
                "registry.deny entries must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> RegistryOptions {
        RegistryOptions {
            max_series_per_meter: self.max_series_per_meter,
            deny_prefixes: self.deny.clone(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_enabled() -> bool {
    true
}
fn default_prefix() -> String {
    DEFAULT_PREFIX.into()
}
fn default_protocol() -> String {
    PROTOCOL_HTTP.into()
}
fn default_max_series_per_meter() -> usize {
    DEFAULT_MAX_SERIES_PER_METER
}
