//! Plugin system for the Pewter framework.
//!
//! # Architecture
//!
//! A plugin is a named, dynamically loadable [`Listener`](pewter_core::Listener)
//! with lifecycle hooks. It is described statically by a
//! [`PluginDescriptor`] (name, dependencies, factory) and instantiated by the
//! [`PluginManager`](crate::manager::PluginManager) when loaded:
//!
//! ```text
//! PluginDescriptor ──create(config)──► Arc<dyn Plugin> ──after_load──► loaded
//!                                                                        │
//!                       dropped ◄── plugin_detached ◄── before_unload ◄──┘
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use pewter::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Plugin for Echo {
//!     fn commands(&self) -> Vec<CommandDoc> {
//!         vec![CommandDoc::new("echo", "Repeats its arguments").usage("echo <text>")]
//!     }
//!
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
//! static ECHO: PluginDescriptor = PluginDescriptor::new("echo", |_| Ok(Arc::new(Echo)));
//! ```
//!
//! # Configuration
//!
//! Each plugin receives the frozen JSON value found under
//! `plugins.settings.<name>` (an empty object when absent). Two keys are
//! interpreted by the framework itself:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `filter` | a [`FilterPolicy`](pewter_core::FilterPolicy) table |
//! | `priority` | overrides [`Plugin::priority`] |

pub mod descriptor;
pub mod listener;

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use pewter_core::{BoxError, Context, ListenerResult, Message};

use crate::manager::PluginManager;

pub use descriptor::{PLUGINS, PluginCatalog, PluginDescriptor, PluginFactory};
pub use listener::PluginListener;

// ─── CommandDoc ───────────────────────────────────────────────────────────────

/// Documentation of one bot command, shown by the help plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDoc {
    /// Command word, without prefix.
    pub name: String,
    /// Argument synopsis, e.g. `load <name...>`.
    pub usage: Option<String>,
    /// One-line description.
    pub summary: String,
}

impl CommandDoc {
    /// Creates a doc entry.
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: None,
            summary: summary.into(),
        }
    }

    /// Sets the usage line.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }
}

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// A live plugin instance.
///
/// Plugins are shared as `Arc<dyn Plugin>`; use interior mutability for
/// state that changes across messages.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Documented commands.
    fn commands(&self) -> Vec<CommandDoc> {
        Vec::new()
    }

    /// Dispatch priority; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Runs once after construction, before the plugin sees any message.
    /// An error discards the instance.
    async fn after_load(&self, _ctx: &PluginLoadContext) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs before unloading. `Some(reason)` refuses the unload.
    async fn before_unload(&self) -> Option<String> {
        None
    }

    /// Handles one message.
    async fn on_message(&self, ctx: &Context, msg: &Message) -> ListenerResult;

    /// Upcast for typed dependency lookup. Implement as `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

// ─── PluginLoadContext ────────────────────────────────────────────────────────

/// Context passed to [`Plugin::after_load`].
///
/// # Example
///
/// ```rust,ignore
/// async fn after_load(&self, ctx: &PluginLoadContext) -> Result<(), BoxError> {
///     let storage = ctx
///         .dependency::<StoragePlugin>("storage")
///         .ok_or("storage plugin unavailable")?;
///     self.storage.set(storage.storage()).ok();
///     Ok(())
/// }
/// ```
pub struct PluginLoadContext {
    name: String,
    config: Arc<Value>,
    dependencies: HashMap<String, Arc<dyn Plugin>>,
    manager: Weak<PluginManager>,
}

impl PluginLoadContext {
    pub(crate) fn new(
        name: impl Into<String>,
        config: Arc<Value>,
        dependencies: HashMap<String, Arc<dyn Plugin>>,
        manager: Weak<PluginManager>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            dependencies,
            manager,
        }
    }

    /// Name the plugin was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw frozen configuration.
    pub fn raw_config(&self) -> &Arc<Value> {
        &self.config
    }

    /// Deserialises the configuration into `T`.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }

    /// A declared dependency, downcast to its concrete type.
    ///
    /// Returns `None` when `name` is not a declared dependency or is of a
    /// different type.
    pub fn dependency<T: Plugin>(&self, name: &str) -> Option<Arc<T>> {
        let plugin = Arc::clone(self.dependencies.get(name)?);
        plugin.as_any().downcast::<T>().ok()
    }

    /// The manager that loaded this plugin.
    ///
    /// Plugins keep the returned handle as a `Weak` to avoid a reference
    /// cycle with the manager. Batches requested while `after_load` is still
    /// running fail with [`PluginError::Reentrant`](crate::PluginError::Reentrant);
    /// load other plugins from message handlers instead.
    pub fn manager(&self) -> Weak<PluginManager> {
        Weak::clone(&self.manager)
    }
}

impl std::fmt::Debug for PluginLoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoadContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .finish()
    }
}
