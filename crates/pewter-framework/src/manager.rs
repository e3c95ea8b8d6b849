//! Plugin lifecycle management.
//!
//! [`PluginManager`] is the sole owner of loaded plugins. It:
//!
//! - Builds plugins from the [`PluginCatalog`] on [`load_all`](PluginManager::load_all),
//!   in dependency order within the batch. A plugin whose dependencies are
//!   neither loaded nor loadable in the same batch is never constructed.
//! - Tears plugins down on [`unload_all`](PluginManager::unload_all), refusing
//!   to remove a plugin that another loaded plugin still depends on.
//! - Consults and notifies [`LifecycleListener`]s around every batch. The
//!   listener registry is one of them, so loaded plugins start receiving
//!   messages as soon as they are attached.
//!
//! Every mutation runs under one coarse async mutex. Dispatch never takes it;
//! queries only take short synchronous read locks. A batch requested from a
//! plugin's `after_load` or `before_unload` hook would wait on that mutex
//! forever, so such nested requests fail with [`PluginError::Reentrant`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pewter_framework::{PluginCatalog, PluginManager};
//!
//! let manager = PluginManager::new(PluginCatalog::linked(), settings);
//! manager.add_lifecycle_listener(registry.clone());
//! let report = manager.load_all(&["storage", "loader"]).await;
//! assert!(report.is_success());
//! ```

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use pewter_core::BoxError;
use pewter_core::router::panic_message;

use crate::error::{PluginError, PluginResult};
use crate::lifecycle::{LifecycleListener, LoadedPlugin};
use crate::plugin::{CommandDoc, Plugin, PluginCatalog, PluginDescriptor, PluginListener, PluginLoadContext};

tokio::task_local! {
    /// Identity of the manager whose batch runs on the current task.
    static BATCH_OWNER: usize;
}

/// Supplies fresh plugin settings for [`PluginManager::reload`].
pub type SettingsSource = Arc<dyn Fn() -> Result<HashMap<String, Value>, BoxError> + Send + Sync>;

// =============================================================================
// Name validation
// =============================================================================

/// Returns `true` for names matching `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Topological sort utility
// =============================================================================

/// Load order of a batch computed with Kahn's algorithm.
#[derive(Debug, Default, PartialEq, Eq)]
struct Layering {
    /// Indices in load order; each layer only depends on earlier ones.
    layers: Vec<Vec<usize>>,
    /// Indices that sit on, or depend on, a cycle.
    blocked: Vec<usize>,
}

impl Layering {
    fn order(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.layers.iter().flatten().copied()
    }
}

/// Orders `batch` so that every plugin follows its in-batch dependencies.
///
/// Only edges between batch members are considered; dependencies outside
/// the batch are checked separately against the loaded set.
fn topological_layers(batch: &[PluginDescriptor]) -> Layering {
    let n = batch.len();
    let index: HashMap<&str, usize> = batch.iter().enumerate().map(|(i, d)| (d.name, i)).collect();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, desc) in batch.iter().enumerate() {
        for dep in desc.dependencies {
            match index.get(dep) {
                Some(&provider) if provider != i => {
                    dependents[provider].push(i);
                    in_degree[i] += 1;
                }
                Some(_) => {
                    warn!(plugin = %desc.name, "Plugin lists itself as a dependency, ignored");
                }
                None => {}
            }
        }
    }

    // Kahn's algorithm, one layer per BFS frontier.
    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        layers.push(current);
        current = next;
    }

    let blocked = (0..n).filter(|&i| in_degree[i] > 0).collect();
    Layering { layers, blocked }
}

// =============================================================================
// BatchReport
// =============================================================================

/// Per-plugin outcome of a batch operation, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    results: Vec<(String, PluginResult<()>)>,
}

impl BatchReport {
    fn push(&mut self, name: &str, result: PluginResult<()>) {
        self.results.push((name.to_string(), result));
    }

    fn set(&mut self, name: &str, result: PluginResult<()>) {
        if let Some(entry) = self.results.iter_mut().find(|(n, _)| n == name) {
            entry.1 = result;
        } else {
            self.push(name, result);
        }
    }

    /// `true` when every requested plugin ended up in the requested state.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    /// All results in request order.
    pub fn results(&self) -> &[(String, PluginResult<()>)] {
        &self.results
    }

    /// Result for one plugin.
    pub fn get(&self, name: &str) -> Option<&PluginResult<()>> {
        self.results.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Names that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(n, _)| n.as_str())
    }

    /// Errors, in request order.
    pub fn failures(&self) -> impl Iterator<Item = &PluginError> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().err())
    }

    /// Reduces the report to the result of `name`.
    pub fn into_result(self, name: &str) -> PluginResult<()> {
        self.results
            .into_iter()
            .find(|(n, _)| n == name)
            .map_or(Ok(()), |(_, r)| r)
    }
}

// =============================================================================
// PluginManager
// =============================================================================

/// Central owner of loaded plugins.
///
/// # Plugin configuration
///
/// `settings` maps plugin name to the JSON value found under
/// `plugins.settings.<name>`. Each load freezes the current value into an
/// `Arc<Value>` for the new instance; [`reload`](Self::reload) first
/// refreshes the map from the [`SettingsSource`], if one is set.
pub struct PluginManager {
    catalog: RwLock<PluginCatalog>,
    settings: RwLock<HashMap<String, Value>>,
    settings_source: RwLock<Option<SettingsSource>>,
    loaded: RwLock<Vec<LoadedPlugin>>,
    lifecycle: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    /// Serialises every mutation.
    op_lock: AsyncMutex<()>,
    this: Weak<PluginManager>,
}

impl PluginManager {
    /// Creates a manager over `catalog` with per-plugin `settings`.
    pub fn new(catalog: PluginCatalog, settings: HashMap<String, Value>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            catalog: RwLock::new(catalog),
            settings: RwLock::new(settings),
            settings_source: RwLock::new(None),
            loaded: RwLock::new(Vec::new()),
            lifecycle: RwLock::new(Vec::new()),
            op_lock: AsyncMutex::new(()),
            this: Weak::clone(this),
        })
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    /// Adds a descriptor to the catalog.
    pub fn register_descriptor(&self, desc: PluginDescriptor) {
        self.catalog.write().register(desc);
    }

    /// Names of every plugin in the catalog.
    pub fn available(&self) -> Vec<&'static str> {
        self.catalog.read().names()
    }

    /// Replaces the per-plugin settings used by subsequent loads.
    pub fn set_settings(&self, settings: HashMap<String, Value>) {
        *self.settings.write() = settings;
    }

    /// Installs the source consulted by [`reload`](Self::reload).
    pub fn set_settings_source(&self, source: SettingsSource) {
        *self.settings_source.write() = Some(source);
    }

    /// Adds a lifecycle listener.
    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.lifecycle.write().push(listener);
    }

    /// Removes a lifecycle listener (pointer identity).
    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) {
        self.lifecycle
            .write()
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
    }

    fn lifecycle_listeners(&self) -> Vec<Arc<dyn LifecycleListener>> {
        self.lifecycle.read().clone()
    }

    fn frozen_config(&self, name: &str) -> Arc<Value> {
        Arc::new(
            self.settings
                .read()
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::default())),
        )
    }

    fn refresh_settings(&self) {
        let source = self.settings_source.read().clone();
        if let Some(source) = source {
            match source() {
                Ok(settings) => self.set_settings(settings),
                Err(e) => warn!(error = %e, "Failed to refresh plugin settings, keeping previous ones"),
            }
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// `true` when `name` is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().iter().any(|l| l.name() == name)
    }

    /// Loaded plugin names, in load order.
    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded.read().iter().map(|l| l.name().to_string()).collect()
    }

    /// A loaded plugin with its listener and configuration.
    pub fn loaded(&self, name: &str) -> Option<LoadedPlugin> {
        self.loaded.read().iter().find(|l| l.name() == name).cloned()
    }

    /// A loaded plugin instance.
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.loaded(name).map(|l| l.plugin)
    }

    /// A loaded plugin downcast to its concrete type.
    pub fn plugin_as<T: Plugin>(&self, name: &str) -> Option<Arc<T>> {
        self.plugin(name)?.as_any().downcast::<T>().ok()
    }

    /// Documented commands of every loaded plugin, as `(plugin, doc)` pairs.
    pub fn commands(&self) -> Vec<(String, CommandDoc)> {
        let plugins: Vec<(String, Arc<dyn Plugin>)> = self
            .loaded
            .read()
            .iter()
            .map(|l| (l.name().to_string(), Arc::clone(&l.plugin)))
            .collect();
        plugins
            .into_iter()
            .flat_map(|(name, plugin)| {
                plugin
                    .commands()
                    .into_iter()
                    .map(move |doc| (name.clone(), doc))
            })
            .collect()
    }

    /// Loaded plugins that declare `name` as a dependency.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.loaded
            .read()
            .iter()
            .filter(|l| l.descriptor.dependencies.iter().any(|dep| *dep == name))
            .map(|l| l.name().to_string())
            .collect()
    }

    // ─── Loading ─────────────────────────────────────────────────────────────

    /// Loads one plugin.
    pub async fn load(&self, name: &str) -> PluginResult<()> {
        self.load_all(&[name]).await.into_result(name)
    }

    /// Loads a batch of plugins.
    ///
    /// Plugins in the batch may depend on each other; they are built in
    /// dependency order. One failure never prevents unrelated plugins from
    /// loading.
    pub async fn load_all<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        if self.in_own_batch() {
            return Self::reentrant(names);
        }
        let _guard = self.op_lock.lock().await;
        BATCH_OWNER.scope(self.identity(), self.load_locked(names)).await
    }

    fn identity(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    fn in_own_batch(&self) -> bool {
        BATCH_OWNER
            .try_with(|owner| *owner == self.identity())
            .unwrap_or(false)
    }

    fn reentrant<S: AsRef<str>>(names: &[S]) -> BatchReport {
        warn!("plugin batch requested from inside a lifecycle hook");
        let mut report = BatchReport::default();
        for name in names.iter().map(AsRef::as_ref) {
            report.push(name, Err(PluginError::Reentrant { plugin: name.to_string() }));
        }
        report
    }

    async fn load_locked<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut batch: Vec<PluginDescriptor> = Vec::new();

        // ── 1. Validate names, skip loaded ones, resolve descriptors ─────────
        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            if !is_valid_name(name) {
                report.push(name, Err(PluginError::InvalidName { name: name.to_string() }));
                continue;
            }
            if self.is_loaded(name) {
                report.push(name, Ok(()));
                continue;
            }
            let desc = self.catalog.read().get(name).copied();
            match desc {
                Some(desc) => {
                    report.push(name, Ok(()));
                    batch.push(desc);
                }
                None => report.push(name, Err(PluginError::NotFound { name: name.to_string() })),
            }
        }

        // ── 2. Dependencies: loaded, or in the batch and not failed ──────────
        let mut failed: HashSet<&'static str> = HashSet::new();
        loop {
            let viable: HashSet<&str> = batch
                .iter()
                .map(|d| d.name)
                .filter(|n| !failed.contains(n))
                .collect();
            let unmet: Vec<(&'static str, Vec<String>)> = batch
                .iter()
                .filter(|d| viable.contains(d.name))
                .filter_map(|desc| {
                    let missing: Vec<String> = desc
                        .dependencies
                        .iter()
                        .filter(|dep| !viable.contains(*dep) && !self.is_loaded(dep))
                        .map(|dep| dep.to_string())
                        .collect();
                    (!missing.is_empty()).then_some((desc.name, missing))
                })
                .collect();
            if unmet.is_empty() {
                break;
            }
            for (name, missing) in unmet {
                error!(plugin = %name, missing = ?missing, "Plugin dependencies not satisfied");
                report.set(name, Err(PluginError::MissingDependencies {
                    plugin: name.to_string(),
                    missing,
                }));
                failed.insert(name);
            }
        }
        batch.retain(|d| !failed.contains(d.name));

        let layering = topological_layers(&batch);
        if !layering.blocked.is_empty() {
            let blocked: HashSet<&str> = layering.blocked.iter().map(|&i| batch[i].name).collect();
            for &i in &layering.blocked {
                let desc = &batch[i];
                let missing: Vec<String> = desc
                    .dependencies
                    .iter()
                    .filter(|dep| blocked.contains(*dep))
                    .map(|dep| dep.to_string())
                    .collect();
                error!(plugin = %desc.name, missing = ?missing, "Plugin dependency cycle");
                report.set(desc.name, Err(PluginError::MissingDependencies {
                    plugin: desc.name.to_string(),
                    missing,
                }));
            }
        }
        let ordered: Vec<PluginDescriptor> = layering.order().map(|i| batch[i]).collect();
        if ordered.is_empty() {
            return report;
        }

        // ── 3. Batch veto ────────────────────────────────────────────────────
        let batch_names: Vec<String> = ordered.iter().map(|d| d.name.to_string()).collect();
        for listener in self.lifecycle_listeners() {
            if let Err(reason) = listener.before_load(&batch_names) {
                warn!(plugins = ?batch_names, reason = %reason, "Plugin load batch vetoed");
                for name in &batch_names {
                    report.set(name, Err(PluginError::Vetoed {
                        plugin: name.clone(),
                        reason: reason.clone(),
                    }));
                }
                return report;
            }
        }

        // ── 4. Construct and attach in dependency order ──────────────────────
        for desc in ordered {
            let missing: Vec<String> = desc
                .dependencies
                .iter()
                .filter(|dep| !self.is_loaded(dep))
                .map(|dep| dep.to_string())
                .collect();
            if !missing.is_empty() {
                report.set(desc.name, Err(PluginError::MissingDependencies {
                    plugin: desc.name.to_string(),
                    missing,
                }));
                continue;
            }
            if let Err(e) = self.attach(desc).await {
                error!(plugin = %desc.name, error = %e, "Plugin failed to load");
                report.set(desc.name, Err(e));
            }
        }

        report
    }

    async fn attach(&self, desc: PluginDescriptor) -> PluginResult<()> {
        let name = desc.name;
        let config = self.frozen_config(name);

        let plugin = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            desc.instantiate(Arc::clone(&config))
        })) {
            Ok(Ok(plugin)) => plugin,
            Ok(Err(e)) => {
                return Err(PluginError::Construction {
                    plugin: name.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(panic) => {
                return Err(PluginError::Construction {
                    plugin: name.to_string(),
                    reason: format!("panicked: {}", panic_message(panic.as_ref())),
                });
            }
        };

        let listener = PluginListener::new(name, Arc::clone(&plugin), &config).map_err(|e| {
            PluginError::Construction {
                plugin: name.to_string(),
                reason: format!("invalid filter or priority: {e}"),
            }
        })?;

        let dependencies = desc
            .dependencies
            .iter()
            .filter_map(|dep| self.plugin(dep).map(|p| (dep.to_string(), p)))
            .collect();
        let ctx = PluginLoadContext::new(name, Arc::clone(&config), dependencies, Weak::clone(&self.this));

        match AssertUnwindSafe(plugin.after_load(&ctx)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PluginError::Initialization {
                    plugin: name.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(panic) => {
                return Err(PluginError::Initialization {
                    plugin: name.to_string(),
                    reason: format!("panicked: {}", panic_message(panic.as_ref())),
                });
            }
        }

        let loaded = LoadedPlugin {
            descriptor: desc,
            plugin,
            listener: Arc::new(listener),
            config,
        };
        self.loaded.write().push(loaded.clone());
        for listener in self.lifecycle_listeners() {
            listener.plugin_attached(&loaded);
        }
        info!(plugin = %name, "Plugin loaded");
        Ok(())
    }

    // ─── Unloading ───────────────────────────────────────────────────────────

    /// Unloads one plugin.
    pub async fn unload(&self, name: &str) -> PluginResult<()> {
        self.unload_all(&[name]).await.into_result(name)
    }

    /// Unloads a batch of plugins, dependents before their dependencies.
    pub async fn unload_all<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        if self.in_own_batch() {
            return Self::reentrant(names);
        }
        let _guard = self.op_lock.lock().await;
        BATCH_OWNER.scope(self.identity(), self.unload_locked(names)).await
    }

    async fn unload_locked<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut batch: Vec<LoadedPlugin> = Vec::new();

        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            if !is_valid_name(name) {
                report.push(name, Err(PluginError::InvalidName { name: name.to_string() }));
                continue;
            }
            match self.loaded(name) {
                Some(loaded) => {
                    report.push(name, Ok(()));
                    batch.push(loaded);
                }
                None => report.push(name, Err(PluginError::NotLoaded { name: name.to_string() })),
            }
        }

        // ── Dependents outside the (shrinking) batch block removal ──────────
        loop {
            let in_batch: HashSet<&str> = batch.iter().map(LoadedPlugin::name).collect();
            let mut blocked: Vec<(&'static str, Vec<String>)> = Vec::new();
            for loaded in &batch {
                let outside: Vec<String> = self
                    .dependents_of(loaded.name())
                    .into_iter()
                    .filter(|d| !in_batch.contains(d.as_str()))
                    .collect();
                if !outside.is_empty() {
                    blocked.push((loaded.name(), outside));
                }
            }
            if blocked.is_empty() {
                break;
            }
            for (name, dependents) in blocked {
                warn!(plugin = %name, dependents = ?dependents, "Plugin still required, not unloading");
                report.set(name, Err(PluginError::HasDependents {
                    plugin: name.to_string(),
                    dependents,
                }));
                batch.retain(|l| l.name() != name);
            }
        }
        if batch.is_empty() {
            return report;
        }

        let batch_names: Vec<String> = batch.iter().map(|l| l.name().to_string()).collect();
        for listener in self.lifecycle_listeners() {
            if let Err(reason) = listener.before_unload(&batch_names) {
                warn!(plugins = ?batch_names, reason = %reason, "Plugin unload batch vetoed");
                for name in &batch_names {
                    report.set(name, Err(PluginError::Vetoed {
                        plugin: name.clone(),
                        reason: reason.clone(),
                    }));
                }
                return report;
            }
        }

        // Dependents first.
        let descriptors: Vec<PluginDescriptor> = batch.iter().map(|l| l.descriptor).collect();
        let layering = topological_layers(&descriptors);
        let order: Vec<usize> = layering.order().rev().chain(layering.blocked.iter().copied()).collect();

        for i in order {
            let loaded = &batch[i];
            let name = loaded.name();

            let dependents = self.dependents_of(name);
            if !dependents.is_empty() {
                report.set(name, Err(PluginError::HasDependents {
                    plugin: name.to_string(),
                    dependents,
                }));
                continue;
            }

            let refusal = match AssertUnwindSafe(loaded.plugin.before_unload()).catch_unwind().await {
                Ok(refusal) => refusal,
                Err(panic) => Some(format!("before_unload panicked: {}", panic_message(panic.as_ref()))),
            };
            if let Some(reason) = refusal {
                warn!(plugin = %name, reason = %reason, "Plugin refused to unload");
                report.set(name, Err(PluginError::Refused {
                    plugin: name.to_string(),
                    reason,
                }));
                continue;
            }

            self.loaded.write().retain(|l| l.name() != name);
            for listener in self.lifecycle_listeners() {
                listener.plugin_detached(loaded);
            }
            info!(plugin = %name, "Plugin unloaded");
        }

        report
    }

    // ─── Reloading ───────────────────────────────────────────────────────────

    /// Unloads the named plugins, refreshes settings, and loads them again.
    ///
    /// Names that are not loaded are simply loaded. A plugin that fails to
    /// unload keeps its old instance and reports the unload error.
    pub async fn reload<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        if self.in_own_batch() {
            return Self::reentrant(names);
        }
        let _guard = self.op_lock.lock().await;
        BATCH_OWNER.scope(self.identity(), self.reload_locked(names)).await
    }

    async fn reload_locked<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        let loaded: Vec<&str> = names.iter().copied().filter(|n| self.is_loaded(n)).collect();
        let unload_report = self.unload_locked(&loaded).await;

        self.refresh_settings();

        let to_load: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| unload_report.get(n).is_none_or(Result::is_ok))
            .collect();
        let load_report = self.load_locked(&to_load).await;

        let mut report = BatchReport::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                continue;
            }
            let result = match unload_report.get(name) {
                Some(Err(e)) => Err(e.clone()),
                _ => load_report.get(name).cloned().unwrap_or(Ok(())),
            };
            report.push(name, result);
        }
        report
    }

    /// Unloads everything, dependents first. Refusals are logged and the
    /// refusing plugins stay loaded.
    pub async fn shutdown(&self) -> BatchReport {
        let names = self.loaded_names();
        let report = self.unload_all(&names).await;
        for err in report.failures() {
            warn!(plugin = %err.plugin(), error = %err, "Plugin not unloaded at shutdown");
        }
        report
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("loaded", &self.loaded_names())
            .field("available", &self.available())
            .finish()
    }
}
