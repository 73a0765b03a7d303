//! Shared error type across srvmeter crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Unified error type used by core and server.
///
/// Metrics recording itself is infallible: the only runtime variant a recorder
/// produces is [`MeterError::Unsupported`], which signals a wiring bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeterError {
    /// Client-side event invoked on a server-side recorder.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl MeterError {
    /// Stable short code, used in logs and tests.
    pub fn code(&self) -> &'static str {
        match self {
            MeterError::Unsupported(_) => "UNSUPPORTED",
            MeterError::InvalidConfig(_) => "INVALID_CONFIG",
            MeterError::UnsupportedVersion => "UNSUPPORTED_VERSION",
            MeterError::Internal(_) => "INTERNAL",
        }
    }
}
