//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [[servers]]
//! name = "libera"
//! addresses = ["irc.libera.chat:6667", "irc.eu.libera.chat:6667"]
//! nick = "pewter"
//! channels = ["#pewter"]
//!
//! [plugins]
//! autoload = ["loader", "help", "echo"]
//!
//! [plugins.settings.loader]
//! admins = ["*!*@staff.example"]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PewterConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// One entry per IRC network.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Plugin selection and per-plugin settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// The matching `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line with all fields.
    Full,
    /// Multi-line, human friendly.
    Pretty,
    /// Newline-delimited JSON.
    #[cfg(feature = "json-log")]
    Json,
}

/// Output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When file output starts a new file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file for `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Include thread IDs.
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    pub span_events: SpanEventConfig,
    /// Per-target levels, e.g. `pewter_runtime::connection = "trace"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

// =============================================================================
// Servers
// =============================================================================

/// One IRC network and the identity used on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique name, used in logs.
    pub name: String,

    /// `host:port` addresses, tried round-robin.
    pub addresses: Vec<String>,

    pub nick: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_realname")]
    pub realname: String,

    /// Server password (`PASS`).
    #[serde(default)]
    pub password: Option<String>,

    /// Sent to NickServ after welcome.
    #[serde(default)]
    pub nickserv_password: Option<String>,

    /// Joined once registration completes. `"#chan key"` joins with a key.
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,

    /// Command given to unprefixed private text; empty disables it.
    #[serde(default = "default_fallback_command")]
    pub fallback_command: String,

    /// Sustained send rate in lines per second; 0 disables throttling.
    #[serde(default = "default_throttle_rate")]
    pub throttle_rate: f64,

    /// Lines that may be sent back to back before throttling starts.
    #[serde(default = "default_throttle_burst")]
    pub throttle_burst: f64,

    /// Silence after which the connection is considered dead; 0 disables
    /// the watchdog.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,

    /// How often the watchdog checks.
    #[serde(default = "default_watchdog_check_secs")]
    pub watchdog_check_secs: u64,

    /// Capabilities requested during CAP negotiation when offered.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    /// Used for received lines that are not valid UTF-8.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// CTCP VERSION reply.
    #[serde(default = "default_version_reply")]
    pub version_reply: String,
}

impl ServerConfig {
    /// A config with defaults for everything but the essentials.
    pub fn new(name: impl Into<String>, address: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addresses: vec![address.into()],
            nick: nick.into(),
            user: default_user(),
            realname: default_realname(),
            password: None,
            nickserv_password: None,
            channels: Vec::new(),
            command_prefix: default_command_prefix(),
            fallback_command: default_fallback_command(),
            throttle_rate: default_throttle_rate(),
            throttle_burst: default_throttle_burst(),
            watchdog_secs: default_watchdog_secs(),
            watchdog_check_secs: default_watchdog_check_secs(),
            capabilities: default_capabilities(),
            encoding: default_encoding(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            version_reply: default_version_reply(),
        }
    }

    /// `None` when the watchdog is disabled.
    pub fn watchdog_interval(&self) -> Option<Duration> {
        (self.watchdog_secs > 0).then(|| Duration::from_secs(self.watchdog_secs))
    }

    pub fn watchdog_check(&self) -> Duration {
        Duration::from_secs(self.watchdog_check_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

fn default_user() -> String {
    "pewter".to_string()
}

fn default_realname() -> String {
    "Pewter IRC bot".to_string()
}

fn default_command_prefix() -> char {
    '.'
}

fn default_fallback_command() -> String {
    "lookup".to_string()
}

fn default_throttle_rate() -> f64 {
    1.0
}

fn default_throttle_burst() -> f64 {
    5.0
}

fn default_watchdog_secs() -> u64 {
    300
}

fn default_watchdog_check_secs() -> u64 {
    30
}

fn default_capabilities() -> Vec<String> {
    vec!["identify-msg".to_string(), "multi-prefix".to_string()]
}

fn default_encoding() -> String {
    "windows-1252".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_version_reply() -> String {
    format!("Pewter {}", env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// Plugins
// =============================================================================

/// Plugin selection and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Loaded as one batch at startup.
    #[serde(default = "default_autoload")]
    pub autoload: Vec<String>,

    /// Per-plugin settings, keyed by plugin name. Each plugin receives its
    /// entry frozen at load time; `filter` and `priority` keys are
    /// interpreted by the framework.
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            autoload: default_autoload(),
            settings: HashMap::new(),
        }
    }
}

fn default_autoload() -> Vec<String> {
    vec!["loader".to_string(), "help".to_string()]
}
