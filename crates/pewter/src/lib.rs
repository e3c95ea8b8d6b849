//! # Pewter
//!
//! A plugin-driven IRC bot framework for Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  line   ┌────────┐  Message  ┌──────────────────────────────┐
//! │  Connection  │────────▶│ Parser │──────────▶│ Router                       │
//! │ (per server) │         └────────┘           │  session listeners  (< 0)    │
//! │  throttle ◀──┼──── send_raw ◀───────────────│  plugin "help"      (0)      │
//! │  watchdog    │                              │  plugin "echo"      (0)      │
//! └──────────────┘                              └──────────────────────────────┘
//!        ▲                                               ▲
//!        └────────────── PewterRuntime ─── PluginManager ┘
//! ```
//!
//! - **Connections** own one network each: address rotation, reconnects,
//!   a throttled send path and a liveness watchdog
//! - **Listeners** see every message in priority order; the login sequence,
//!   PING handling and CTCP replies are listeners too
//! - **Plugins** are listeners with a lifecycle, loaded and unloaded at
//!   runtime by the [`PluginManager`](framework::PluginManager)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pewter::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Plugin for Echo {
//!     async fn on_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
//!         if msg.bot_command() != Some("echo") {
//!             return Ok(Outcome::Continue);
//!         }
//!         ctx.reply(msg, msg.tail().unwrap_or_default()).await?;
//!         Ok(Outcome::Handled)
//!     }
//!
//!     fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
//!         self
//!     }
//! }
//!
//! #[distributed_slice(PLUGINS)]
//! #[linkme(crate = pewter::linkme)]
//! static ECHO: PluginDescriptor = PluginDescriptor::new("echo", |_| Ok(Arc::new(Echo)));
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     PewterRuntime::builder().build()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `builtin`: loader, help and storage plugins (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use pewter_core as core;
pub use pewter_framework as framework;
pub use pewter_runtime as runtime;
pub use pewter_transport as transport;

#[doc(hidden)]
pub use pewter_framework::linkme;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pewter::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use pewter_runtime::{Connection, ConnectionHandle, PewterConfig, PewterRuntime};

    // Plugin system
    pub use pewter_framework::{
        CommandDoc, PLUGINS, Plugin, PluginCatalog, PluginDescriptor, PluginLoadContext,
        PluginManager,
    };
    pub use pewter_framework::linkme::distributed_slice;

    #[cfg(feature = "builtin")]
    pub use pewter_framework::builtin::{Storage, StoragePlugin};

    // Messages and dispatch
    pub use pewter_core::{
        BoxError, Command, Context, Listener, ListenerResult, Message, Outcome, numeric,
    };

    pub use async_trait::async_trait;
    pub use std::any::Any;
    pub use std::sync::Arc;
}
