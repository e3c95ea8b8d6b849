//! Unified error types for the Pewter core.
//!
//! Plugin lifecycle errors live in `pewter-framework`; configuration and
//! runtime errors live in `pewter-runtime`.

use thiserror::Error;

/// Boxed error returned by listener and plugin hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures while connecting to or talking with an IRC server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// A received line exceeded the codec limit.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// No writer is attached; the connection is down.
    #[error("not connected")]
    NotConnected,

    /// The watchdog or an explicit stop ended the connection.
    #[error("connection cancelled")]
    Cancelled,

    #[error("socket: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
