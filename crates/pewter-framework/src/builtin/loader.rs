//! Administrative plugin: load, unload and reload plugins from IRC.
//!
//! ```text
//! <admin> .load echo dice
//! <bot>   Loaded echo.
//! <bot>   dice: no such plugin 'dice'
//! <admin> .plugins
//! <bot>   Loaded plugins: loader, help, echo
//! ```
//!
//! Only senders whose `nick!user@host` matches one of the configured admin
//! masks may use these commands:
//!
//! ```toml
//! [plugins.settings.loader]
//! admins = ["*!*@admin.example.net"]
//! require_identified = true
//! ```

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use linkme::distributed_slice;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use pewter_core::{BoxError, Context, ListenerResult, Message, Outcome};

use crate::manager::PluginManager;
use crate::plugin::{CommandDoc, PLUGINS, Plugin, PluginDescriptor, PluginLoadContext};

/// Descriptor of the loader plugin.
pub const LOADER_PLUGIN: PluginDescriptor =
    PluginDescriptor::new("loader", LoaderPlugin::create).describe("Runtime plugin administration");

#[distributed_slice(PLUGINS)]
static LOADER: PluginDescriptor = LOADER_PLUGIN;

/// Matches `text` against a hostmask pattern with `*` and `?` wildcards,
/// ignoring ASCII case.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Hostmask patterns allowed to administer plugins.
    pub admins: Vec<String>,
    /// Also require the sender to be identified to services (identify-msg).
    pub require_identified: bool,
}

/// The loader plugin.
pub struct LoaderPlugin {
    config: LoaderConfig,
    manager: OnceLock<Weak<PluginManager>>,
}

impl LoaderPlugin {
    /// Creates the plugin.
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            manager: OnceLock::new(),
        }
    }

    fn create(config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        let config = LoaderConfig::deserialize(config.as_ref())?;
        Ok(Arc::new(Self::new(config)))
    }

    fn is_admin(&self, msg: &Message) -> bool {
        if self.config.require_identified && msg.identified() != Some(true) {
            return false;
        }
        let Some(prefix) = msg.prefix() else {
            return false;
        };
        self.config
            .admins
            .iter()
            .any(|mask| wildcard_match(mask, prefix))
    }
}

#[async_trait]
impl Plugin for LoaderPlugin {
    fn commands(&self) -> Vec<CommandDoc> {
        vec![
            CommandDoc::new("load", "Loads plugins").usage("load <name...>"),
            CommandDoc::new("unload", "Unloads plugins").usage("unload <name...>"),
            CommandDoc::new("reload", "Reloads plugins with fresh configuration")
                .usage("reload <name...>"),
            CommandDoc::new("plugins", "Lists loaded plugins"),
        ]
    }

    async fn after_load(&self, ctx: &PluginLoadContext) -> Result<(), BoxError> {
        if self.config.admins.is_empty() {
            tracing::warn!("Loader has no admins configured; administrative commands are disabled");
        }
        // Each instance is loaded once; reload builds a fresh one.
        let first = self.manager.set(ctx.manager()).is_ok();
        debug_assert!(first, "loader initialized twice");
        Ok(())
    }

    async fn on_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        let command = match msg.bot_command() {
            Some(c @ ("load" | "unload" | "reload" | "plugins")) => c,
            _ => return Ok(Outcome::Continue),
        };
        if !self.is_admin(msg) {
            ctx.reply(msg, "Permission denied.").await?;
            return Ok(Outcome::Handled);
        }
        let manager = self
            .manager
            .get()
            .and_then(Weak::upgrade)
            .ok_or("plugin manager is no longer available")?;

        if command == "plugins" {
            let names = manager.loaded_names();
            let line = if names.is_empty() {
                "No plugins loaded.".to_string()
            } else {
                format!("Loaded plugins: {}", names.join(", "))
            };
            ctx.reply(msg, &line).await?;
            return Ok(Outcome::Handled);
        }

        let names: Vec<&str> = msg.tail().unwrap_or_default().split_whitespace().collect();
        if names.is_empty() {
            ctx.reply(msg, &format!("Usage: {command} <name...>")).await?;
            return Ok(Outcome::Handled);
        }

        info!(command, plugins = ?names, admin = ?msg.prefix(), "Plugin administration requested");
        let (report, verb) = match command {
            "load" => (manager.load_all(&names).await, "Loaded"),
            "unload" => (manager.unload_all(&names).await, "Unloaded"),
            _ => (manager.reload(&names).await, "Reloaded"),
        };
        for (name, result) in report.results() {
            let line = match result {
                Ok(()) => format!("{verb} {name}."),
                Err(e) => format!("{name}: {e}"),
            };
            ctx.reply(msg, &line).await?;
        }
        Ok(Outcome::Handled)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*!*@admin.example", "Nick!user@ADMIN.example"));
        assert!(wildcard_match("n?ck!*", "nick!u@h"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("*!*@admin.example", "nick!user@evil.example"));
        assert!(!wildcard_match("n?ck", "nck"));
        assert!(!wildcard_match("abc", "abcd"));
    }

    #[test]
    fn test_config_defaults() {
        let config = LoaderConfig::deserialize(&serde_json::json!({})).unwrap();
        assert!(config.admins.is_empty());
        assert!(!config.require_identified);
    }
}
