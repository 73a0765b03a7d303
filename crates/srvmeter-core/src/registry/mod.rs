//! Measurement registry seam.
//!
//! The recorder only depends on [`Registry`]; [`MemoryRegistry`] is the
//! in-process implementation used by the server and by tests.

pub mod instruments;
pub mod memory;

use std::sync::Arc;

use crate::catalog::MeterKind;

pub use instruments::{
    Adder, Counter, DistributionSummary, Gauge, Meter, SummarySnapshot, Timer, TimerSnapshot,
};
pub use memory::{MemoryRegistry, RegistryOptions, SeriesSnapshot};

/// Identity of one registered series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterId {
    pub name: String,
    pub kind: MeterKind,
    /// Tag pairs in catalog order.
    pub tags: Vec<(String, String)>,
    pub base_unit: Option<&'static str>,
    pub description: Option<&'static str>,
}

impl MeterId {
    pub fn new(name: impl Into<String>, kind: MeterKind, tags: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            kind,
            tags,
            base_unit: None,
            description: None,
        }
    }

    pub fn with_base_unit(mut self, unit: Option<&'static str>) -> Self {
        self.base_unit = unit;
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Registry contract consumed by recorders.
///
/// Registration is idempotent per [`MeterId`]: the same id yields a handle to
/// the same instrument. A registry may return a no-op handle for any id it
/// declines to back (cardinality ceilings, deny filters).
pub trait Registry: Send + Sync {
    fn counter(&self, id: MeterId) -> Counter;
    fn timer(&self, id: MeterId) -> Timer;
    fn summary(&self, id: MeterId) -> DistributionSummary;
    /// Register a gauge reporting the current value of `source`.
    fn gauge(&self, id: MeterId, source: Arc<Adder>) -> Gauge;
}
