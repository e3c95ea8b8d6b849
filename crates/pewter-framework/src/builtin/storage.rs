//! Built-in key/value storage plugin.
//!
//! Exposes a [`Storage`] backend to plugins that declare `"storage"` as a
//! dependency:
//!
//! ```rust,ignore
//! pub const COUNTER: PluginDescriptor =
//!     PluginDescriptor::new("counter", Counter::create).depends_on(&["storage"]);
//!
//! async fn after_load(&self, ctx: &PluginLoadContext) -> Result<(), BoxError> {
//!     let storage = ctx.dependency::<StoragePlugin>("storage").ok_or("no storage")?;
//!     let _ = self.storage.set(storage.storage());
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! | `backend` | Type | Persistence |
//! |-----------|------|-------------|
//! | `memory` | [`MemoryStorage`] | none |
//! | `yaml` | [`YamlFileStorage`] | one YAML mapping file at `path` |
//!
//! ```toml
//! [plugins.settings.storage]
//! backend = "yaml"
//! path = "./data/pewter.yaml"
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use pewter_core::{BoxError, Context, ListenerResult, Message, Outcome};

use crate::plugin::{PLUGINS, Plugin, PluginDescriptor, PluginLoadContext};

/// Descriptor of the storage plugin.
pub const STORAGE_PLUGIN: PluginDescriptor =
    PluginDescriptor::new("storage", StoragePlugin::create).describe("Key/value storage");

#[distributed_slice(PLUGINS)]
static STORAGE: PluginDescriptor = STORAGE_PLUGIN;

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The backing file is not a YAML mapping.
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },
}

// ─── Storage trait ────────────────────────────────────────────────────────────

/// Minimal key/value store shared between plugins.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads a value.
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Writes a value, replacing any previous one.
    async fn write(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Removes a value, returning it.
    async fn remove(&self, key: &str) -> Result<Option<Value>, StorageError>;
}

// ─── MemoryStorage ────────────────────────────────────────────────────────────

/// Volatile storage; contents are lost when the plugin is unloaded.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().remove(key))
    }
}

// ─── YamlFileStorage ──────────────────────────────────────────────────────────

/// Storage persisted as a single YAML mapping.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct YamlFileStorage {
    path: PathBuf,
    lock: AsyncMutex<()>,
}

impl YamlFileStorage {
    /// Creates a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: AsyncMutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_yaml::from_str(&text).map_err(|source| StorageError::Yaml {
            path: self.path.clone(),
            source,
        })
    }

    async fn store(&self, values: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let text = serde_yaml::to_string(values).map_err(|source| StorageError::Yaml {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl Storage for YamlFileStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value);
        self.store(&values).await
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        let removed = values.remove(key);
        if removed.is_some() {
            self.store(&values).await?;
        }
        Ok(removed)
    }
}

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// Which backend the storage plugin uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// [`MemoryStorage`].
    #[default]
    Memory,
    /// [`YamlFileStorage`].
    Yaml,
}

/// Configuration of the storage plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageBackend,
    /// File used by the YAML backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("pewter-storage.yaml"),
        }
    }
}

/// The storage plugin. Other plugins reach it through
/// [`PluginLoadContext::dependency`].
pub struct StoragePlugin {
    storage: Arc<dyn Storage>,
}

impl StoragePlugin {
    /// Wraps an existing backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The backend.
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    fn create(config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        let config = StorageConfig::deserialize(config.as_ref())?;
        let storage: Arc<dyn Storage> = match config.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Yaml => Arc::new(YamlFileStorage::new(config.path)),
        };
        Ok(Arc::new(Self::new(storage)))
    }
}

#[async_trait]
impl Plugin for StoragePlugin {
    async fn after_load(&self, _ctx: &PluginLoadContext) -> Result<(), BoxError> {
        // Fail the load early on an unreadable file.
        self.storage.read("").await?;
        Ok(())
    }

    async fn on_message(&self, _ctx: &Context, _msg: &Message) -> ListenerResult {
        Ok(Outcome::Continue)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
