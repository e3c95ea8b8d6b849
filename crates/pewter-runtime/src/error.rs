//! Runtime error types.

use pewter_core::TransportError;
use pewter_framework::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A server was configured without any address to connect to.
    #[error("Server '{server}' has no addresses")]
    NoAddresses { server: String },

    /// Transport failure outside of a connection's own retry loop.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Plugin operation failed.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
