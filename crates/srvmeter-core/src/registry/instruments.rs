//! Instrument handles.
//!
//! A handle is either backed by a shared cell (cheap to clone, all clones
//! observe the same values) or a no-op placeholder whose writes are discarded.
//! Registries hand out no-op handles for series they refuse to back.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Common surface of every instrument handle.
pub trait Meter: Clone + Send + Sync + 'static {
    /// True when writes to this handle are discarded.
    fn is_noop(&self) -> bool;

    /// True when both handles point at the same backing cell.
    /// Two no-op handles are never the same instrument.
    fn same_instrument(&self, other: &Self) -> bool;
}

fn same_cell<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Lock-free signed counter backing one or more gauges.
#[derive(Debug, Default)]
pub struct Adder(AtomicI64);

impl Adder {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
    pub fn value(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

// --------------------
// Counter
// --------------------
#[derive(Clone, Default)]
pub struct Counter {
    cell: Option<Arc<AtomicU64>>,
}

impl Counter {
    pub fn new() -> Self {
        Self { cell: Some(Arc::new(AtomicU64::new(0))) }
    }
    pub fn noop() -> Self {
        Self { cell: None }
    }
    pub fn increment(&self) {
        self.increment_by(1);
    }
    pub fn increment_by(&self, n: u64) {
        if let Some(c) = &self.cell {
            c.fetch_add(n, Ordering::Relaxed);
        }
    }
    pub fn count(&self) -> u64 {
        self.cell.as_ref().map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}

impl Meter for Counter {
    fn is_noop(&self) -> bool {
        self.cell.is_none()
    }
    fn same_instrument(&self, other: &Self) -> bool {
        same_cell(&self.cell, &other.cell)
    }
}

// --------------------
// Timer
// --------------------
#[derive(Default)]
struct TimerCell {
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

/// Point-in-time view of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimerSnapshot {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / self.count as u128;
        Duration::from_nanos(nanos as u64)
    }
}

#[derive(Clone, Default)]
pub struct Timer {
    cell: Option<Arc<TimerCell>>,
}

impl Timer {
    pub fn new() -> Self {
        Self { cell: Some(Arc::new(TimerCell::default())) }
    }
    pub fn noop() -> Self {
        Self { cell: None }
    }

    pub fn record(&self, d: Duration) {
        let Some(c) = &self.cell else { return };
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        c.count.fetch_add(1, Ordering::Relaxed);
        c.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        c.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let Some(c) = &self.cell else { return TimerSnapshot::default() };
        TimerSnapshot {
            count: c.count.load(Ordering::Relaxed),
            total: Duration::from_nanos(c.total_nanos.load(Ordering::Relaxed)),
            max: Duration::from_nanos(c.max_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl Meter for Timer {
    fn is_noop(&self) -> bool {
        self.cell.is_none()
    }
    fn same_instrument(&self, other: &Self) -> bool {
        same_cell(&self.cell, &other.cell)
    }
}

// --------------------
// Distribution summary
// --------------------
#[derive(Default)]
struct SummaryCell {
    count: AtomicU64,
    total: AtomicU64,
    max: AtomicU64,
}

/// Point-in-time view of a distribution summary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummarySnapshot {
    pub count: u64,
    pub total: u64,
    pub max: u64,
}

impl SummarySnapshot {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

#[derive(Clone, Default)]
pub struct DistributionSummary {
    cell: Option<Arc<SummaryCell>>,
}

impl DistributionSummary {
    pub fn new() -> Self {
        Self { cell: Some(Arc::new(SummaryCell::default())) }
    }
    pub fn noop() -> Self {
        Self { cell: None }
    }

    pub fn record(&self, amount: u64) {
        let Some(c) = &self.cell else { return };
        c.count.fetch_add(1, Ordering::Relaxed);
        c.total.fetch_add(amount, Ordering::Relaxed);
        c.max.fetch_max(amount, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        let Some(c) = &self.cell else { return SummarySnapshot::default() };
        SummarySnapshot {
            count: c.count.load(Ordering::Relaxed),
            total: c.total.load(Ordering::Relaxed),
            max: c.max.load(Ordering::Relaxed),
        }
    }
}

impl Meter for DistributionSummary {
    fn is_noop(&self) -> bool {
        self.cell.is_none()
    }
    fn same_instrument(&self, other: &Self) -> bool {
        same_cell(&self.cell, &other.cell)
    }
}

// --------------------
// Gauge
// --------------------

/// Read-only view over an [`Adder`].
#[derive(Clone, Default)]
pub struct Gauge {
    source: Option<Arc<Adder>>,
}

impl Gauge {
    pub fn new(source: Arc<Adder>) -> Self {
        Self { source: Some(source) }
    }
    pub fn noop() -> Self {
        Self { source: None }
    }
    pub fn value(&self) -> i64 {
        self.source.as_ref().map(|a| a.value()).unwrap_or(0)
    }
}

impl Meter for Gauge {
    fn is_noop(&self) -> bool {
        self.source.is_none()
    }
    fn same_instrument(&self, other: &Self) -> bool {
        same_cell(&self.source, &other.source)
    }
}
