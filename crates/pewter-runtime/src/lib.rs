//! # Pewter Runtime
//!
//! Connections, configuration and orchestration for the Pewter IRC bot
//! framework.
//!
//! This crate provides:
//! - [`Connection`]: one self-reconnecting network session with a throttled
//!   send path, a liveness [`Watchdog`] and round-robin address rotation
//! - The per-session listeners in [`session`] (PING, CAP negotiation,
//!   registration, autojoin, RPL_TRYAGAIN, CTCP)
//! - Layered configuration ([`config`]) and logging setup ([`logging`])
//! - [`PewterRuntime`], which shares one plugin manager between all
//!   connections and runs until Ctrl+C
//!
//! ```rust,ignore
//! use pewter_runtime::PewterRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PewterRuntime::builder()
//!         .config_file("pewter.toml")
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod rotation;
pub mod runtime;
pub mod session;
pub mod throttle;
pub mod watchdog;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PewterConfig, PluginsConfig,
    ServerConfig,
};
pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use rotation::ServerRotation;
pub use runtime::{PewterRuntime, RuntimeBuilder};
pub use throttle::Throttle;
pub use watchdog::Watchdog;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
