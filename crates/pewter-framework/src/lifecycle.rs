//! Lifecycle listeners: observers and gatekeepers of plugin (un)loading.
//!
//! The [`PluginManager`](crate::manager::PluginManager) consults every
//! registered [`LifecycleListener`] once per batch before mutating the plugin
//! set, then notifies each of them per plugin afterwards:
//!
//! ```text
//! load_all(names)   ─► before_load(batch)   ─► [construct, after_load] ─► plugin_attached
//! unload_all(names) ─► before_unload(batch) ─► [before_unload hook]    ─► plugin_detached
//! ```
//!
//! The [`ListenerRegistry`] is itself a lifecycle listener: it registers the
//! listener of each attached plugin and unregisters it on detach.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use pewter_core::{Listener, ListenerRegistry};

use crate::plugin::{Plugin, PluginDescriptor};

/// A plugin as held by the manager.
#[derive(Clone)]
pub struct LoadedPlugin {
    /// The descriptor it was built from.
    pub descriptor: PluginDescriptor,
    /// The live instance.
    pub plugin: Arc<dyn Plugin>,
    /// Its listener registry entry.
    pub listener: Arc<dyn Listener>,
    /// The frozen configuration it was built with.
    pub config: Arc<Value>,
}

impl LoadedPlugin {
    /// Plugin name.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.descriptor.name)
            .field("priority", &self.listener.priority())
            .finish()
    }
}

/// Observer of plugin attach/detach with a per-batch veto.
///
/// All methods default to allowing everything and observing nothing.
pub trait LifecycleListener: Send + Sync {
    /// Called once before a load batch. `Err(reason)` aborts the batch.
    fn before_load(&self, _names: &[String]) -> Result<(), String> {
        Ok(())
    }

    /// Called after a plugin has been loaded.
    fn plugin_attached(&self, _plugin: &LoadedPlugin) {}

    /// Called once before an unload batch. `Err(reason)` aborts the batch.
    fn before_unload(&self, _names: &[String]) -> Result<(), String> {
        Ok(())
    }

    /// Called after a plugin has been removed.
    fn plugin_detached(&self, _plugin: &LoadedPlugin) {}
}

impl LifecycleListener for ListenerRegistry {
    fn plugin_attached(&self, plugin: &LoadedPlugin) {
        debug!(plugin = %plugin.name(), "Registering plugin listener");
        self.register(Arc::clone(&plugin.listener));
    }

    fn plugin_detached(&self, plugin: &LoadedPlugin) {
        debug!(plugin = %plugin.name(), "Unregistering plugin listener");
        self.unregister(&plugin.listener);
    }
}
