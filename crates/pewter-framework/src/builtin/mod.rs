//! Built-in plugins shipped with the Pewter framework.
//!
//! These plugins are enabled by the `builtin` feature flag (on by default)
//! and are linked into [`PLUGINS`](crate::plugin::PLUGINS), so
//! [`PluginCatalog::linked`](crate::plugin::PluginCatalog::linked) always
//! offers them.
//!
//! | Plugin | Commands | Description |
//! |--------|----------|-------------|
//! | [`LOADER_PLUGIN`] | `load`, `unload`, `reload`, `plugins` | Runtime plugin administration |
//! | [`HELP_PLUGIN`] | `help` | Lists documented commands |
//! | [`STORAGE_PLUGIN`] | | Key/value storage for other plugins |

pub mod help;
pub mod loader;
pub mod storage;

pub use help::{HELP_PLUGIN, HelpPlugin};
pub use loader::{LOADER_PLUGIN, LoaderConfig, LoaderPlugin, wildcard_match};
pub use storage::{
    MemoryStorage, STORAGE_PLUGIN, Storage, StorageBackend, StorageConfig, StorageError,
    StoragePlugin, YamlFileStorage,
};
