//! In-process registry backed by `DashMap`.
//!
//! Series are keyed by [`MeterId`]. Each meter name has a series budget; once
//! it is spent, new tag combinations for that name get no-op handles. Names
//! matching a deny prefix are never backed.

use std::collections::BTreeMap;
use std::fmt::{Display, Write};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::catalog::MeterKind;

use super::instruments::{Adder, Counter, DistributionSummary, Gauge, Timer};
use super::{MeterId, Registry};

/// Default series budget per meter name.
pub const DEFAULT_MAX_SERIES_PER_METER: usize = 1000;

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub max_series_per_meter: usize,
    /// Meter names starting with any of these are denied.
    pub deny_prefixes: Vec<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            max_series_per_meter: DEFAULT_MAX_SERIES_PER_METER,
            deny_prefixes: Vec::new(),
        }
    }
}

#[derive(Clone)]
enum Registered {
    Counter(Counter),
    Timer(Timer),
    Summary(DistributionSummary),
    Gauge(Gauge),
}

struct NameBudget {
    kind: MeterKind,
    series: usize,
    warned: bool,
}

/// Value part of a [`SeriesSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesValue {
    Counter { count: u64 },
    Gauge { value: i64 },
    Timer { count: u64, total_seconds: f64, max_seconds: f64 },
    DistributionSummary { count: u64, total: u64, max: u64 },
}

/// Exported view of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub name: String,
    pub tags: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(flatten)]
    pub value: SeriesValue,
}

#[derive(Default)]
pub struct MemoryRegistry {
    meters: DashMap<MeterId, Registered>,
    budgets: DashMap<String, NameBudget>,
    opts: RegistryOptions,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(opts: RegistryOptions) -> Self {
        Self {
            meters: DashMap::new(),
            budgets: DashMap::new(),
            opts,
        }
    }

    /// Number of backed series.
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Number of backed series registered under `name`.
    pub fn series_count(&self, name: &str) -> usize {
        self.budgets.get(name).map(|b| b.series).unwrap_or(0)
    }

    fn is_denied(&self, name: &str) -> bool {
        self.opts.deny_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Spend one unit of `name`'s series budget.
    fn admit(&self, name: &str, kind: MeterKind) -> bool {
        let mut budget = self
            .budgets
            .entry(name.to_string())
            .or_insert_with(|| NameBudget { kind, series: 0, warned: false });

        if budget.kind != kind {
            tracing::warn!(meter=%name, registered=%budget.kind.as_str(), requested=%kind.as_str(), "meter kind conflict; series not backed");
            return false;
        }
        if budget.series >= self.opts.max_series_per_meter {
            if !budget.warned {
                budget.warned = true;
                tracing::warn!(meter=%name, max=self.opts.max_series_per_meter, "series limit reached; further tag combinations are not backed");
            }
            return false;
        }
        budget.series += 1;
        true
    }

    fn register(&self, id: MeterId, make: impl FnOnce() -> Registered) -> Option<Registered> {
        if let Some(existing) = self.meters.get(&id) {
            return Some(existing.value().clone());
        }
        if self.is_denied(&id.name) {
            return None;
        }

        match self.meters.entry(id) {
            Entry::Occupied(o) => Some(o.get().clone()),
            Entry::Vacant(v) => {
                if !self.admit(&v.key().name, v.key().kind) {
                    return None;
                }
                let meter = make();
                tracing::debug!(meter=%v.key().name, kind=%v.key().kind.as_str(), tags=?v.key().tags, "registered meter");
                v.insert(meter.clone());
                Some(meter)
            }
        }
    }

    /// All backed series, sorted by name then tags.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let mut out: Vec<SeriesSnapshot> = self
            .meters
            .iter()
            .map(|r| {
                let id = r.key();
                let value = match r.value() {
                    Registered::Counter(c) => SeriesValue::Counter { count: c.count() },
                    Registered::Gauge(g) => SeriesValue::Gauge { value: g.value() },
                    Registered::Timer(t) => {
                        let s = t.snapshot();
                        SeriesValue::Timer {
                            count: s.count,
                            total_seconds: s.total.as_secs_f64(),
                            max_seconds: s.max.as_secs_f64(),
                        }
                    }
                    Registered::Summary(d) => {
                        let s = d.snapshot();
                        SeriesValue::DistributionSummary { count: s.count, total: s.total, max: s.max }
                    }
                };
                SeriesSnapshot {
                    name: id.name.clone(),
                    tags: id.tags.clone(),
                    base_unit: id.base_unit,
                    description: id.description,
                    value,
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        out
    }

    /// Look up one series by name and exact tag set.
    pub fn find(&self, name: &str, tags: &[(&str, &str)]) -> Option<SeriesSnapshot> {
        self.snapshot().into_iter().find(|s| {
            s.name == name
                && s.tags.len() == tags.len()
                && s.tags.iter().zip(tags).all(|((k, v), (ek, ev))| k == ek && v == ev)
        })
    }

    /// Render in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut grouped: BTreeMap<String, Vec<SeriesSnapshot>> = BTreeMap::new();
        for s in self.snapshot() {
            grouped.entry(s.name.clone()).or_default().push(s);
        }

        let mut out = String::new();
        for (name, series) in grouped {
            let base = sanitize_name(&name);
            let Some(first) = series.first() else { continue };
            let help = first.description;
            match first.value {
                SeriesValue::Counter { .. } => {
                    let n = format!("{base}_total");
                    write_help(&mut out, &n, help);
                    let _ = writeln!(out, "# TYPE {n} counter");
                    for s in &series {
                        if let SeriesValue::Counter { count } = s.value {
                            write_line(&mut out, &n, &s.tags, count);
                        }
                    }
                }
                SeriesValue::Gauge { .. } => {
                    write_help(&mut out, &base, help);
                    let _ = writeln!(out, "# TYPE {base} gauge");
                    for s in &series {
                        if let SeriesValue::Gauge { value } = s.value {
                            write_line(&mut out, &base, &s.tags, value);
                        }
                    }
                }
                SeriesValue::Timer { .. } => {
                    let n = format!("{base}_seconds");
                    write_help(&mut out, &n, help);
                    let _ = writeln!(out, "# TYPE {n} summary");
                    for s in &series {
                        if let SeriesValue::Timer { count, total_seconds, .. } = s.value {
                            write_line(&mut out, &format!("{n}_count"), &s.tags, count);
                            write_line(&mut out, &format!("{n}_sum"), &s.tags, total_seconds);
                        }
                    }
                    let _ = writeln!(out, "# TYPE {n}_max gauge");
                    for s in &series {
                        if let SeriesValue::Timer { max_seconds, .. } = s.value {
                            write_line(&mut out, &format!("{n}_max"), &s.tags, max_seconds);
                        }
                    }
                }
                SeriesValue::DistributionSummary { .. } => {
                    let n = match first.base_unit {
                        Some(unit) => format!("{base}_{unit}"),
                        None => base.clone(),
                    };
                    write_help(&mut out, &n, help);
                    let _ = writeln!(out, "# TYPE {n} summary");
                    for s in &series {
                        if let SeriesValue::DistributionSummary { count, total, .. } = s.value {
                            write_line(&mut out, &format!("{n}_count"), &s.tags, count);
                            write_line(&mut out, &format!("{n}_sum"), &s.tags, total);
                        }
                    }
                    let _ = writeln!(out, "# TYPE {n}_max gauge");
                    for s in &series {
                        if let SeriesValue::DistributionSummary { max, .. } = s.value {
                            write_line(&mut out, &format!("{n}_max"), &s.tags, max);
                        }
                    }
                }
            }
        }
        out
    }
}

impl Registry for MemoryRegistry {
    fn counter(&self, id: MeterId) -> Counter {
        match self.register(id, || Registered::Counter(Counter::new())) {
            Some(Registered::Counter(c)) => c,
            _ => Counter::noop(),
        }
    }

    fn timer(&self, id: MeterId) -> Timer {
        match self.register(id, || Registered::Timer(Timer::new())) {
            Some(Registered::Timer(t)) => t,
            _ => Timer::noop(),
        }
    }

    fn summary(&self, id: MeterId) -> DistributionSummary {
        match self.register(id, || Registered::Summary(DistributionSummary::new())) {
            Some(Registered::Summary(d)) => d,
            _ => DistributionSummary::noop(),
        }
    }

    fn gauge(&self, id: MeterId, source: Arc<Adder>) -> Gauge {
        match self.register(id, || Registered::Gauge(Gauge::new(source))) {
            Some(Registered::Gauge(g)) => g,
            _ => Gauge::noop(),
        }
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect()
}

fn write_help(out: &mut String, name: &str, help: Option<&str>) {
    if let Some(help) = help {
        let help = help.replace('\\', "\\\\").replace('\n', "\\n");
        let _ = writeln!(out, "# HELP {name} {help}");
    }
}

fn write_line(out: &mut String, name: &str, tags: &[(String, String)], value: impl Display) {
    if tags.is_empty() {
        let _ = writeln!(out, "{name} {value}");
        return;
    }
    let label_str = tags
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", sanitize_name(k), escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{name}{{{label_str}}} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Meter;
    use std::time::Duration;

    fn id(name: &str, kind: MeterKind, uri: &str) -> MeterId {
        MeterId::new(name, kind, vec![("uri".into(), uri.into())])
    }

    #[test]
    fn registration_is_idempotent() {
        let reg = MemoryRegistry::new();
        let a = reg.counter(id("errors", MeterKind::Counter, "/a"));
        let b = reg.counter(id("errors", MeterKind::Counter, "/a"));
        assert!(a.same_instrument(&b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn series_budget_yields_noop() {
        let reg = MemoryRegistry::with_options(RegistryOptions {
            max_series_per_meter: 2,
            ..Default::default()
        });
        assert!(!reg.timer(id("t", MeterKind::Timer, "/a")).is_noop());
        assert!(!reg.timer(id("t", MeterKind::Timer, "/b")).is_noop());
        assert!(reg.timer(id("t", MeterKind::Timer, "/c")).is_noop());
        // known series are still served
        assert!(!reg.timer(id("t", MeterKind::Timer, "/a")).is_noop());
        assert_eq!(reg.series_count("t"), 2);
    }

    #[test]
    fn deny_prefix_yields_noop() {
        let reg = MemoryRegistry::with_options(RegistryOptions {
            deny_prefixes: vec!["internal.".into()],
            ..Default::default()
        });
        assert!(reg.counter(id("internal.x", MeterKind::Counter, "/")).is_noop());
        assert!(!reg.counter(id("public.x", MeterKind::Counter, "/")).is_noop());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn kind_conflict_yields_noop() {
        let reg = MemoryRegistry::new();
        assert!(!reg.counter(id("m", MeterKind::Counter, "/a")).is_noop());
        assert!(reg.timer(id("m", MeterKind::Timer, "/a")).is_noop());
    }

    #[test]
    fn render_prometheus_text() {
        let reg = MemoryRegistry::new();
        reg.counter(id("http.server.errors", MeterKind::Counter, "/a")).increment();
        reg.timer(id("http.server.response.time", MeterKind::Timer, "/a"))
            .record(Duration::from_millis(500));
        reg.summary(
            id("http.server.data.sent", MeterKind::DistributionSummary, "/a")
                .with_base_unit(Some("bytes")),
        )
        .record(42);
        let adder = Arc::new(Adder::new());
        adder.increment();
        reg.gauge(
            MeterId::new("http.server.connections.active", MeterKind::Gauge, vec![]),
            adder,
        );

        let text = reg.render_prometheus();
        assert!(text.contains("# TYPE http_server_errors_total counter"));
        assert!(text.contains("http_server_errors_total{uri=\"/a\"} 1"));
        assert!(text.contains("http_server_response_time_seconds_count{uri=\"/a\"} 1"));
        assert!(text.contains("http_server_response_time_seconds_sum{uri=\"/a\"} 0.5"));
        assert!(text.contains("http_server_data_sent_bytes_sum{uri=\"/a\"} 42"));
        assert!(text.contains("http_server_connections_active 1"));
        assert!(!text.contains("# HELP"));
    }

    #[test]
    fn descriptions_become_help_lines() {
        let reg = MemoryRegistry::new();
        reg.counter(
            id("http.server.errors", MeterKind::Counter, "/a").with_description("Number of errors."),
        )
        .increment();
        reg.counter(id("http.server.errors", MeterKind::Counter, "/b").with_description("Number of errors."));

        let text = reg.render_prometheus();
        assert_eq!(text.matches("# HELP http_server_errors_total Number of errors.").count(), 1);
        let help = text.find("# HELP").unwrap();
        let ty = text.find("# TYPE").unwrap();
        assert!(help < ty);

        let json = serde_json::to_value(reg.snapshot()).unwrap();
        assert_eq!(json[0]["description"], "Number of errors.");
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let reg = MemoryRegistry::new();
        reg.counter(id("errors", MeterKind::Counter, "/a")).increment_by(3);
        let json = serde_json::to_value(reg.snapshot()).unwrap();
        assert_eq!(json[0]["name"], "errors");
        assert_eq!(json[0]["type"], "counter");
        assert_eq!(json[0]["count"], 3);
    }
}
