//! Errors raised while loading or checking a [`PewterConfig`](super::PewterConfig).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly named file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// figment failed to read, merge or deserialize a source.
    #[error("config could not be parsed: {0}")]
    ParseError(String),

    #[error("config rejected: {message}")]
    ValidationError { message: String },

    #[error("config is missing `{field}`")]
    MissingField { field: String },

    #[error("server name `{0}` is used more than once")]
    DuplicateServerName(String),

    /// A server address is not `host:port`.
    #[error("server address `{address}` is invalid ({reason})")]
    InvalidAddress { address: String, reason: String },

    /// An entry in `plugins` is not an identifier.
    #[error("`{0}` is not a valid plugin name")]
    InvalidPluginName(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::ValidationError { message }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::MissingField { field }
    }

    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        let (address, reason) = (address.into(), reason.into());
        Self::InvalidAddress { address, reason }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
