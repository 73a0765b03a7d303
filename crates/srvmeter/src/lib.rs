//! Top-level facade crate for srvmeter.
//!
//! Re-exports the core recorder types and the server library so users can depend on a single crate.

pub mod core {
    pub use srvmeter_core::*;
}

pub mod server {
    pub use srvmeter_server::*;
}
