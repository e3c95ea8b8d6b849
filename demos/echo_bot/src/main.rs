//! Echo Bot Example
//!
//! A small bot built on the Pewter framework. Besides the built-in `load`,
//! `help` and `storage` plugins it links an `echo` plugin that repeats its
//! arguments and remembers, through the storage plugin, how often each nick
//! has used it.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config pewter.toml
//! ```
//!
//! with a configuration such as:
//!
//! ```toml
//! [[servers]]
//! name = "libera"
//! addresses = ["irc.libera.chat:6667"]
//! nick = "pewter-echo"
//! channels = ["#pewter"]
//!
//! [plugins]
//! autoload = ["loader", "help", "storage", "echo"]
//!
//! [plugins.settings.echo]
//! tag = "» "
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pewter::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

// ============================================================================
// Echo Plugin
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EchoConfig {
    /// Prepended to every echoed line.
    tag: String,
}

struct EchoPlugin {
    config: EchoConfig,
    storage: std::sync::OnceLock<Arc<dyn Storage>>,
}

impl EchoPlugin {
    fn create(config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        let config = EchoConfig::deserialize(config.as_ref())?;
        Ok(Arc::new(Self {
            config,
            storage: std::sync::OnceLock::new(),
        }))
    }

    fn counter_key(nick: &str) -> String {
        format!("echo.count.{}", nick.to_lowercase())
    }

    /// Bumps and returns the echo count of `nick`.
    async fn bump(&self, nick: &str) -> Result<u64, BoxError> {
        let Some(storage) = self.storage.get() else {
            return Ok(0);
        };
        let key = Self::counter_key(nick);
        let count = storage
            .read(&key)
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        storage.write(&key, json!(count)).await?;
        Ok(count)
    }

    async fn count(&self, nick: &str) -> Result<u64, BoxError> {
        let Some(storage) = self.storage.get() else {
            return Ok(0);
        };
        Ok(storage
            .read(&Self::counter_key(nick))
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn commands(&self) -> Vec<CommandDoc> {
        vec![
            CommandDoc::new("echo", "Repeats its arguments").usage("echo <text>"),
            CommandDoc::new("echoes", "Shows how often a nick used echo").usage("echoes [nick]"),
        ]
    }

    async fn after_load(&self, ctx: &PluginLoadContext) -> Result<(), BoxError> {
        let storage = ctx
            .dependency::<StoragePlugin>("storage")
            .ok_or("storage plugin unavailable")?;
        let first = self.storage.set(storage.storage()).is_ok();
        debug_assert!(first, "echo initialized twice");
        Ok(())
    }

    async fn on_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        let Some(nick) = msg.nick() else {
            return Ok(Outcome::Continue);
        };

        match msg.bot_command() {
            Some("echo") => {
                let Some(text) = msg.tail() else {
                    return Ok(Outcome::Continue);
                };
                let count = self.bump(nick).await?;
                debug!(nick = %nick, count, "Echoing");
                ctx.reply(msg, &format!("{}{text}", self.config.tag)).await?;
                Ok(Outcome::Handled)
            }
            Some("echoes") => {
                let who = msg
                    .tail()
                    .and_then(|t| t.split_whitespace().next())
                    .unwrap_or(nick);
                let count = self.count(who).await?;
                ctx.reply(msg, &format!("{who} has used echo {count} time(s)."))
                    .await?;
                Ok(Outcome::Handled)
            }
            _ => Ok(Outcome::Continue),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[distributed_slice(PLUGINS)]
#[linkme(crate = pewter::linkme)]
static ECHO: PluginDescriptor = PluginDescriptor::new("echo", EchoPlugin::create)
    .depends_on(&["storage"])
    .describe("Repeats what it is told");

// ============================================================================
// Main Entry Point
// ============================================================================

/// Runs the echo bot until Ctrl+C.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (defaults to ./pewter.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = PewterRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    info!(
        servers = runtime.config().servers.len(),
        plugins = ?runtime.manager().available(),
        "Starting echo bot"
    );

    runtime.run().await?;

    Ok(())
}
