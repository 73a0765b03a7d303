//! srvmeter server library entry.
//!
//! Wires the core recorder into an axum server: config, the customization
//! hook that installs the active metrics sink, connection and request hooks,
//! demo routes and ops endpoints. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod ops;
pub mod router;
pub mod services;
pub mod sink;
pub mod transport;
