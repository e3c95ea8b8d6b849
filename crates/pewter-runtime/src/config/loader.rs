//! Layered configuration loading.
//!
//! Sources are merged with [figment], later ones overriding earlier ones:
//!
//! ```text
//! defaults ─► pewter.{profile}.toml ─► pewter.toml ─► PEWTER_* env ─► set()/merge()
//! ```
//!
//! With the `yaml-config` feature, `pewter.yaml`/`pewter.yml` (and their
//! profile variants) are discovered as well, after the TOML files. In each
//! format the first search path holding a main file wins.
//!
//! Environment variables use `__` as the nesting separator, so
//! `PEWTER_LOGGING__LEVEL=debug` sets `logging.level` and
//! `PEWTER_PLUGINS__SETTINGS__STORAGE__BACKEND=yaml` reaches into a plugin's
//! settings. `PEWTER_PROFILE` selects the profile and is not merged.
//!
//! ```rust,ignore
//! use pewter_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/pewter.toml")
//!     .set("logging.level", "debug")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::PewterConfig;
use super::validation::validate_config;

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "PEWTER_PROFILE";

const ENV_PREFIX: &str = "PEWTER_";

// ─── Profile ──────────────────────────────────────────────────────────────────

/// Deployment profile. Selects the `pewter.{profile}.*` overlay files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, case-insensitively. `dev` and `prod` are
    /// accepted as short forms.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => Self::Custom(name),
        }
    }

    /// The profile named by [`PROFILE_ENV`], or Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .ok()
            .map_or_else(Self::default, |name| Self::parse(&name))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── File formats ─────────────────────────────────────────────────────────────

/// A configuration file format compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl ConfigFormat {
    /// Enabled formats, in merge order.
    const ENABLED: &'static [ConfigFormat] = &[
        #[cfg(feature = "toml-config")]
        ConfigFormat::Toml,
        #[cfg(feature = "yaml-config")]
        ConfigFormat::Yaml,
    ];

    /// Main file names looked up in each search path, by preference.
    fn file_names(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["pewter.toml", "config.toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["pewter.yaml", "pewter.yml", "config.yaml", "config.yml"],
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?;
        Self::ENABLED.iter().copied().find(|format| {
            format
                .file_names()
                .iter()
                .any(|name| Path::new(name).extension() == Some(ext))
        })
    }

    #[allow(unreachable_code, unused_variables)]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

/// `dir/name.ext` → `dir/name.{profile}.ext`.
fn profile_variant(path: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    Some(path.with_file_name(format!("{stem}.{profile}.{ext}")))
}

// ─── ConfigLoader ─────────────────────────────────────────────────────────────

/// Builds a [`PewterConfig`] from files, the environment and overrides.
///
/// The loader is `Clone` and [`load`](Self::load) takes `&self`, so a loader
/// can be kept and run again later. Plugin settings are refreshed this way
/// on reload.
#[derive(Clone)]
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader with the profile from [`PROFILE_ENV`], no explicit search
    /// paths and environment variables enabled.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Without any, the current directory and
    /// the user configuration directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(dir) => self.search_path(dir),
            Err(_) => self,
        }
    }

    /// Adds `<config dir>/pewter` (e.g. `~/.config/pewter`).
    pub fn with_user_config_dir(self) -> Self {
        match user_config_dir() {
            Some(dir) => self.search_path(dir),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration above every other source.
    pub fn merge(mut self, config: PewterConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Merges one value at a dotted key path, e.g. `("logging.level", "debug")`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Merges every source, then deserializes and validates the result.
    pub fn load(&self) -> ConfigResult<PewterConfig> {
        let mut figment = Figment::from(Serialized::defaults(PewterConfig::default()));

        for (format, path) in self.sources()? {
            info!(path = %path.display(), "Loading configuration file");
            figment = format.merge_into(figment, &path);
        }
        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        figment = figment.merge(self.overrides.clone());

        let config: PewterConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            servers = config.servers.len(),
            plugins = config.plugins.autoload.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Files to merge, lowest priority first.
    fn sources(&self) -> ConfigResult<Vec<(ConfigFormat, PathBuf)>> {
        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            let format = ConfigFormat::from_path(path).ok_or_else(|| {
                ConfigError::ParseError(format!(
                    "unsupported or disabled configuration format: {}",
                    path.display()
                ))
            })?;
            let mut files: Vec<_> = profile_variant(path, &self.profile)
                .filter(|variant| variant.exists())
                .map(|variant| (format, variant))
                .into_iter()
                .collect();
            files.push((format, path.clone()));
            return Ok(files);
        }

        let dirs = if self.search_paths.is_empty() {
            std::env::current_dir()
                .ok()
                .into_iter()
                .chain(user_config_dir())
                .collect()
        } else {
            self.search_paths.clone()
        };

        let mut files = Vec::new();
        for &format in ConfigFormat::ENABLED {
            let main = dirs.iter().find_map(|dir| {
                format
                    .file_names()
                    .iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.exists())
            });
            if let Some(main) = main {
                if let Some(variant) = profile_variant(&main, &self.profile)
                    && variant.exists()
                {
                    files.push((format, variant));
                }
                files.push((format, main));
            }
        }

        if files.is_empty() {
            warn!(paths = ?dirs, "No configuration file found, using defaults");
        }
        Ok(files)
    }
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pewter"))
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<PewterConfig> {
    ConfigLoader::new().load()
}

/// Loads one file, plus its profile variant and the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<PewterConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
