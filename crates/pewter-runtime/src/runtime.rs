//! Runtime orchestration.
//!
//! [`PewterRuntime`] ties the pieces together: it owns the plugin manager and
//! the listener registry shared by every network, autoloads the configured
//! plugins and runs one [`Connection`] task per configured server until a
//! shutdown signal arrives.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pewter_runtime::PewterRuntime;
//!
//! // Loads pewter.toml from the current directory, or defaults
//! let runtime = PewterRuntime::new();
//!
//! // Custom configuration
//! let runtime = PewterRuntime::builder()
//!     .config_file("config/pewter.toml")
//!     .profile("production")
//!     .build()?;
//!
//! runtime.run().await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use pewter_core::{BoxError, Listener, ListenerRegistry, Router};
use pewter_framework::{PluginCatalog, PluginManager, SettingsSource};
use pewter_transport::{Connector, TcpConnector};

use crate::config::{ConfigLoader, ConfigResult, PewterConfig};
use crate::connection::Connection;
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// How long shutdown waits for each `QUIT` to be written.
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// The Pewter runtime.
pub struct PewterRuntime {
    config: PewterConfig,
    registry: Arc<ListenerRegistry>,
    router: Router,
    manager: Arc<PluginManager>,
    connector: Arc<dyn Connector>,
    connections: RwLock<Vec<Arc<Connection>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl PewterRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, or defaults if there is none or it fails to load.
    pub fn new() -> Self {
        match ConfigLoader::new().with_current_dir().load() {
            Ok(config) => Self::from_config(&config),
            Err(e) => {
                eprintln!("pewter: ignoring unusable config: {e}");
                Self::from_config(&PewterConfig::default())
            }
        }
    }

    /// Starts a [`RuntimeBuilder`] that searches the current directory.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration, with every plugin
    /// linked into the binary and plain TCP connections.
    pub fn from_config(config: &PewterConfig) -> Self {
        Self::assemble(
            config.clone(),
            PluginCatalog::linked(),
            Arc::new(TcpConnector::new()),
        )
    }

    fn assemble(config: PewterConfig, catalog: PluginCatalog, connector: Arc<dyn Connector>) -> Self {
        logging::init_from_config(&config.logging);

        let registry = Arc::new(ListenerRegistry::new());
        let manager = PluginManager::new(catalog, config.plugins.settings.clone());
        manager.add_lifecycle_listener(registry.clone());

        info!(
            log_level = %config.logging.level,
            servers = config.servers.len(),
            plugins = ?manager.available(),
            "runtime assembled"
        );

        Self {
            router: Router::new(Arc::clone(&registry)),
            registry,
            manager,
            connector,
            connections: RwLock::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &PewterConfig {
        &self.config
    }

    /// The plugin manager shared by all connections.
    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// The persistent listener registry shared by all connections.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Live connections, in configuration order.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    /// A live connection by server name.
    pub fn connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registers a listener that is not a plugin. It sees messages from
    /// every connection.
    pub fn register_listener(&self, listener: Arc<dyn Listener>) {
        debug!(listener = %listener.name(), priority = listener.priority(), "Registered listener");
        self.registry.register(listener);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Autoloads plugins and starts one connection per server.
    ///
    /// Plugin failures are logged and do not prevent startup.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }

        if let Some(server) = self.config.servers.iter().find(|s| s.addresses.is_empty()) {
            self.running.store(false, Ordering::SeqCst);
            return Err(RuntimeError::NoAddresses {
                server: server.name.clone(),
            });
        }

        info!("Starting Pewter runtime");

        let report = self.manager.load_all(&self.config.plugins.autoload).await;
        for (name, result) in report.results() {
            match result {
                Ok(()) => debug!(plugin = %name, "Autoloaded"),
                Err(e) => error!(plugin = %name, error = %e, "Failed to autoload plugin"),
            }
        }

        if self.config.servers.is_empty() {
            warn!("No servers configured");
        }

        let mut connections = self.connections.write();
        let mut tasks = self.tasks.lock();
        for server in &self.config.servers {
            let connection = Connection::new(
                server.clone(),
                self.router.clone(),
                Arc::clone(&self.connector),
            );
            let span = info_span!("connection", server = %server.name);
            tasks.push(tokio::spawn(Arc::clone(&connection).run().instrument(span)));
            connections.push(connection);
        }

        info!(connections = connections.len(), "Runtime started");
        Ok(())
    }

    /// Quits every connection, waits for their tasks and unloads all plugins.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return Ok(());
        }

        info!("Stopping Pewter runtime");

        let connections = std::mem::take(&mut *self.connections.write());
        for connection in &connections {
            if tokio::time::timeout(QUIT_TIMEOUT, connection.quit("Shutting down"))
                .await
                .is_err()
            {
                connection.stop();
            }
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Connection task failed");
            }
        }

        self.manager.shutdown().await;

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Pewter is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl Default for PewterRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PewterRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PewterRuntime")
            .field("running", &self.is_running())
            .field("connections", &self.connections.read().len())
            .field("manager", &self.manager)
            .finish()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`PewterRuntime`] with custom configuration.
///
/// A runtime built this way re-reads its configuration sources whenever a
/// plugin is reloaded, so edited plugin settings take effect on `reload`.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    catalog: Option<PluginCatalog>,
    connector: Option<Arc<dyn Connector>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            catalog: None,
            connector: None,
        }
    }

    fn map_loader(mut self, f: impl FnOnce(ConfigLoader) -> ConfigLoader) -> Self {
        self.config_loader = f(self.config_loader);
        self
    }

    /// Loads exactly this file instead of searching for `pewter.*`.
    pub fn config_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.map_loader(|l| l.file(path))
    }

    /// Also merges `pewter.<profile>.*` next to each base file.
    pub fn profile(self, profile: impl AsRef<str>) -> Self {
        self.map_loader(|l| l.profile(profile))
    }

    pub fn search_path<P: AsRef<Path>>(self, path: P) -> Self {
        self.map_loader(|l| l.search_path(path))
    }

    /// `PEWTER_*` variables are read unless [`without_env`](Self::without_env) is set.
    pub fn with_env(self) -> Self {
        self.map_loader(ConfigLoader::with_env)
    }

    pub fn without_env(self) -> Self {
        self.map_loader(ConfigLoader::without_env)
    }

    /// Layers `config` above files and environment.
    pub fn merge(self, config: PewterConfig) -> Self {
        self.map_loader(|l| l.merge(config))
    }

    /// Uses `catalog` instead of every linked plugin.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Uses `connector` instead of plain TCP.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<PewterRuntime> {
        let config = self.config_loader.load()?;
        let runtime = PewterRuntime::assemble(
            config,
            self.catalog.unwrap_or_else(PluginCatalog::linked),
            self.connector
                .unwrap_or_else(|| Arc::new(TcpConnector::new())),
        );

        let loader = self.config_loader;
        let source: SettingsSource =
            Arc::new(move || -> Result<HashMap<String, Value>, BoxError> {
                Ok(loader.load()?.plugins.settings)
            });
        runtime.manager.set_settings_source(source);

        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn builder(dir: &Path) -> RuntimeBuilder {
        PewterRuntime::builder()
            .search_path(dir)
            .without_env()
    }

    #[tokio::test]
    async fn test_start_autoloads_and_stop_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = builder(dir.path()).build().unwrap();

        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert_eq!(runtime.manager().loaded_names(), ["loader", "help"]);
        assert_eq!(runtime.registry().len(), 2);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.manager().loaded_names().is_empty());
        assert!(runtime.registry().is_empty());
    }

    #[tokio::test]
    async fn test_server_without_addresses_is_rejected() {
        let mut server = ServerConfig::new("empty", "h:1", "pewter");
        server.addresses.clear();
        let config = PewterConfig {
            servers: vec![server],
            ..Default::default()
        };
        let runtime = PewterRuntime::from_config(&config);
        assert!(matches!(
            runtime.start().await,
            Err(RuntimeError::NoAddresses { server }) if server == "empty"
        ));
        assert!(!runtime.is_running());
    }

    #[cfg(feature = "toml-config")]
    #[tokio::test]
    async fn test_reload_rereads_plugin_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pewter.toml");
        std::fs::write(&path, "[plugins.settings.help]\nmotto = \"first\"\n").unwrap();

        let runtime = builder(dir.path()).build().unwrap();
        runtime.start().await.unwrap();
        let config = runtime.manager().loaded("help").unwrap().config;
        assert_eq!(config["motto"], "first");

        std::fs::write(&path, "[plugins.settings.help]\nmotto = \"second\"\n").unwrap();
        assert!(runtime.manager().reload(&["help"]).await.is_success());
        let config = runtime.manager().loaded("help").unwrap().config;
        assert_eq!(config["motto"], "second");

        runtime.stop().await.unwrap();
    }
}
