//! # Pewter Framework
//!
//! Plugin lifecycle management for the Pewter IRC bot framework.
//!
//! This layer provides:
//! - The [`Plugin`] contract and static [`PluginDescriptor`]s collected in a
//!   [`PluginCatalog`] (explicitly, or at link time through [`PLUGINS`])
//! - The [`PluginManager`], which loads and unloads plugins in batches with
//!   dependency ordering, vetoes and failure containment
//! - [`LifecycleListener`]s, through which the listener registry follows the
//!   set of loaded plugins
//! - Built-in administrative plugins and a storage service (with the
//!   `builtin` feature)

pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod plugin;

#[cfg(feature = "builtin")]
pub mod builtin;

pub use error::{PluginError, PluginResult};
pub use lifecycle::{LifecycleListener, LoadedPlugin};
pub use manager::{BatchReport, PluginManager, SettingsSource, is_valid_name};
pub use plugin::{
    CommandDoc, PLUGINS, Plugin, PluginCatalog, PluginDescriptor, PluginFactory, PluginListener,
    PluginLoadContext,
};

// Re-exported for `#[distributed_slice(PLUGINS)]` at call sites.
#[doc(hidden)]
pub use linkme;
