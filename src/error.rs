//! Custom error types for the application.
//!
//! `TraceError` is the single error type of the library. Using the
//! `thiserror` crate, it consolidates the failure sources of one acquisition
//! cycle so that the poll loop can log and classify them uniformly:
//!
//! - **`Config`**: Wraps `figment::Error` for syntax or type errors in the
//!   configuration file or environment overrides.
//! - **`Configuration`**: Semantic errors in a configuration that parsed
//!   correctly (e.g. an invalid controller address).
//! - **`Transport`**: Wraps [`TransportError`] from the controller link.
//!   Fatal at startup, skipped during steady-state polling.
//! - **`BlockSize`**: The transport returned a buffer of the wrong length.
//!   Treated like a transport fault.
//! - **`Io`** / **`Csv`**: Filesystem and ledger write failures.
//!
//! Decode problems inside a block are not errors; they degrade to `None`.

use thiserror::Error;

use crate::hardware::TransportError;

/// Convenience alias for results using the application error type.
pub type TraceResult<T> = std::result::Result<T, TraceError>;

/// Primary error type for the acquisition pipeline.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Controller communication failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The telemetry buffer did not have the contracted size.
    #[error("Telemetry block has {actual} bytes, expected {expected}")]
    BlockSize {
        /// Contracted block size.
        expected: usize,
        /// Size actually received.
        actual: usize,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization failure (config file generation, JSON output).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<figment::Error> for TraceError {
    fn from(value: figment::Error) -> Self {
        TraceError::Config(Box::new(value))
    }
}

impl TraceError {
    /// True for faults of the controller link, which the poll loop skips.
    pub fn is_transport(&self) -> bool {
        matches!(self, TraceError::Transport(_) | TraceError::BlockSize { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_message() {
        let err = TraceError::BlockSize {
            expected: 482,
            actual: 10,
        };
        assert_eq!(err.to_string(), "Telemetry block has 10 bytes, expected 482");
        assert!(err.is_transport());
    }

    #[test]
    fn test_transport_conversion() {
        let err: TraceError = TransportError::NotConnected.into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("Not connected"));
    }

    #[test]
    fn test_io_is_not_transport() {
        let err: TraceError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(!err.is_transport());
    }
}
