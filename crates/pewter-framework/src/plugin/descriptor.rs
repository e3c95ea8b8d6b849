//! Plugin descriptors and the catalog of loadable plugins.

use std::collections::BTreeMap;
use std::sync::Arc;

use linkme::distributed_slice;
use serde_json::Value;
use tracing::warn;

use pewter_core::BoxError;

use super::Plugin;

/// Factory building a plugin from its frozen configuration.
pub type PluginFactory = fn(Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError>;

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// A static, `Copy` handle that names a plugin and knows how to build it.
///
/// Dependencies are declared here rather than on the instance so that a
/// plugin with unmet dependencies is never constructed.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Unique plugin name (also the configuration key).
    pub name: &'static str,
    /// Names of plugins that must be loaded first.
    pub dependencies: &'static [&'static str],
    /// One-line description.
    pub description: &'static str,
    /// Builds the live instance.
    pub create: PluginFactory,
}

impl PluginDescriptor {
    /// Creates a descriptor without dependencies.
    pub const fn new(name: &'static str, create: PluginFactory) -> Self {
        Self {
            name,
            dependencies: &[],
            description: "",
            create,
        }
    }

    /// Sets the dependencies.
    pub const fn depends_on(mut self, dependencies: &'static [&'static str]) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the description.
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Runs the factory.
    #[inline]
    pub fn instantiate(&self, config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        (self.create)(config)
    }
}

// ─── Link-time registry ───────────────────────────────────────────────────────

/// Every descriptor contributed with `#[distributed_slice(PLUGINS)]` across
/// the final binary.
#[distributed_slice]
pub static PLUGINS: [PluginDescriptor];

// ─── PluginCatalog ────────────────────────────────────────────────────────────

/// The set of plugins the manager may load, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    descriptors: BTreeMap<&'static str, PluginDescriptor>,
}

impl PluginCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog of every descriptor linked into [`PLUGINS`].
    pub fn linked() -> Self {
        let mut catalog = Self::new();
        for desc in PLUGINS.iter() {
            catalog.register(*desc);
        }
        catalog
    }

    /// Adds a descriptor. A later descriptor with the same name wins.
    pub fn register(&mut self, desc: PluginDescriptor) {
        if self.descriptors.insert(desc.name, desc).is_some() {
            warn!(plugin = %desc.name, "Duplicate plugin descriptor, last registration wins");
        }
    }

    /// Adds a descriptor (builder pattern).
    pub fn with(mut self, desc: PluginDescriptor) -> Self {
        self.register(desc);
        self
    }

    /// Looks up a descriptor.
    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.descriptors.get(name)
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.keys().copied().collect()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
