//! Demo HTTP handlers served behind the metrics middleware.

pub mod echo;

pub use echo::{echo, fail, item};
