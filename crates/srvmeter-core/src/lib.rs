//! srvmeter core: metric catalog, instrument registry seam, and the
//! server-side metrics recorder.
//!
//! The recorder turns per-request and per-connection lifecycle events into
//! updates on long-lived, dimensionally tagged instruments. Each distinct
//! combination of dimension values maps to exactly one instrument, created at
//! most once even under concurrent first use. This crate carries no transport
//! or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are denied outside tests. Recording never
//! fails the caller: the only error a recorder returns is
//! [`MeterError::Unsupported`] for client-only events.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod address;
pub mod catalog;
pub mod error;
pub mod recorder;
pub mod registry;

pub use error::{MeterError, Result};
pub use recorder::{ChannelMetricsRecorder, HttpServerMetricsRecorder, ServerMetricsRecorder};
pub use registry::{MemoryRegistry, Registry};
