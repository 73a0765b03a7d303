//! Transport hooks: per-connection lifecycle and per-request middleware.

mod body;
pub mod connection;
pub mod layer;

pub use connection::ConnMeta;
