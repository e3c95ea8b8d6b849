//! Configuration for the Pewter runtime.
//!
//! Layered loading (defaults, profile file, main file, `PEWTER_*`
//! environment, programmatic overrides) lives in [`loader`]; the resulting
//! tree is described in [`schema`] and checked by [`validation`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, PROFILE_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PewterConfig, PluginsConfig,
    ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
