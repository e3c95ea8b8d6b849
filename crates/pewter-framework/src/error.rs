//! Error types for plugin lifecycle operations.

use thiserror::Error;

/// Why a plugin could not be loaded or unloaded.
///
/// Every variant names the plugin it concerns so that batch reports can be
/// relayed to operators one line per plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The name is not a valid identifier.
    #[error("invalid plugin name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// No descriptor with this name is registered in the catalog.
    #[error("no such plugin '{name}'")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// Declared dependencies are neither loaded nor loadable in this batch.
    #[error("'{plugin}' is missing dependencies: {}", missing.join(", "))]
    MissingDependencies {
        /// The plugin that could not load.
        plugin: String,
        /// The unmet dependencies.
        missing: Vec<String>,
    },

    /// A lifecycle listener rejected the whole batch.
    #[error("'{plugin}' vetoed: {reason}")]
    Vetoed {
        /// The plugin in the rejected batch.
        plugin: String,
        /// Reason given by the lifecycle listener.
        reason: String,
    },

    /// The descriptor factory failed or panicked.
    #[error("'{plugin}' failed to construct: {reason}")]
    Construction {
        /// The plugin.
        plugin: String,
        /// Error text.
        reason: String,
    },

    /// The `after_load` hook failed or panicked.
    #[error("'{plugin}' failed to initialize: {reason}")]
    Initialization {
        /// The plugin.
        plugin: String,
        /// Error text.
        reason: String,
    },

    /// Unload was requested for a plugin that is not loaded.
    #[error("'{name}' is not loaded")]
    NotLoaded {
        /// The requested name.
        name: String,
    },

    /// Other loaded plugins still depend on this one.
    #[error("'{plugin}' is required by: {}", dependents.join(", "))]
    HasDependents {
        /// The plugin that must stay.
        plugin: String,
        /// Loaded plugins depending on it.
        dependents: Vec<String>,
    },

    /// The plugin's own `before_unload` hook refused.
    #[error("{reason}")]
    Refused {
        /// The plugin that refused.
        plugin: String,
        /// The plugin's reason, verbatim.
        reason: String,
    },

    /// A lifecycle hook asked the manager for another batch while its own
    /// batch was still running.
    #[error("'{plugin}' requested from inside a lifecycle hook")]
    Reentrant {
        /// The requested plugin.
        plugin: String,
    },
}

impl PluginError {
    /// Name of the plugin this error is about.
    pub fn plugin(&self) -> &str {
        match self {
            Self::InvalidName { name } | Self::NotFound { name } | Self::NotLoaded { name } => name,
            Self::MissingDependencies { plugin, .. }
            | Self::Vetoed { plugin, .. }
            | Self::Construction { plugin, .. }
            | Self::Initialization { plugin, .. }
            | Self::HasDependents { plugin, .. }
            | Self::Refused { plugin, .. }
            | Self::Reentrant { plugin } => plugin,
        }
    }
}

/// Result type for single-plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
