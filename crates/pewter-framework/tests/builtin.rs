//! Built-in administrative plugins driven through the router, as they would
//! be from a live connection.

#![cfg(feature = "builtin")]

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pewter_core::{
    BoxError, Context, ListenerRegistry, ListenerResult, Message, Outcome, ParseOptions, Parser,
    RecordingOutbound, Router,
};
use pewter_framework::builtin::{HELP_PLUGIN, LOADER_PLUGIN, STORAGE_PLUGIN, StoragePlugin};
use pewter_framework::{Plugin, PluginCatalog, PluginDescriptor, PluginManager};

struct Noop;

impl Noop {
    fn create(_config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        Ok(Arc::new(Noop))
    }
}

#[async_trait]
impl Plugin for Noop {
    async fn on_message(&self, _ctx: &Context, _msg: &Message) -> ListenerResult {
        Ok(Outcome::Continue)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

const NOOP: PluginDescriptor = PluginDescriptor::new("noop", Noop::create);

struct Harness {
    manager: Arc<PluginManager>,
    router: Router,
    parser: Parser,
    outbound: Arc<RecordingOutbound>,
    ctx: Context,
}

impl Harness {
    async fn new(settings: Value) -> Self {
        let catalog = PluginCatalog::new()
            .with(LOADER_PLUGIN)
            .with(HELP_PLUGIN)
            .with(STORAGE_PLUGIN)
            .with(NOOP);
        let settings: HashMap<String, Value> = serde_json::from_value(settings).unwrap();
        let manager = PluginManager::new(catalog, settings);
        let registry = Arc::new(ListenerRegistry::new());
        manager.add_lifecycle_listener(registry.clone());
        let report = manager.load_all(&["loader", "help"]).await;
        assert!(report.is_success(), "{report:?}");

        let outbound = Arc::new(RecordingOutbound::new("pewter"));
        Self {
            manager,
            router: Router::new(registry),
            parser: Parser::new(ParseOptions {
                own_nick: Some("pewter".into()),
                ..ParseOptions::default()
            }),
            ctx: Context::new(outbound.clone()),
            outbound,
        }
    }

    async fn say(&self, line: &str) -> Vec<String> {
        let msg = self.parser.parse(line);
        self.router.dispatch(&self.ctx, &msg, &[]).await;
        self.outbound.take()
    }
}

fn admin_settings() -> Value {
    json!({ "loader": { "admins": ["*!*@admin.example"] } })
}

#[tokio::test]
async fn test_admin_loads_and_unloads() {
    let bot = Harness::new(admin_settings()).await;

    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.load noop nosuch").await;
    assert_eq!(
        replies,
        [
            "PRIVMSG #ops :Loaded noop.",
            "PRIVMSG #ops :nosuch: no such plugin 'nosuch'",
        ]
    );
    assert!(bot.manager.is_loaded("noop"));

    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.plugins").await;
    assert_eq!(replies, ["PRIVMSG #ops :Loaded plugins: loader, help, noop"]);

    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.unload noop").await;
    assert_eq!(replies, ["PRIVMSG #ops :Unloaded noop."]);
    assert!(!bot.manager.is_loaded("noop"));
}

#[tokio::test]
async fn test_non_admin_is_denied() {
    let bot = Harness::new(admin_settings()).await;
    let replies = bot.say(":mallory!m@evil.example PRIVMSG #ops :.load noop").await;
    assert_eq!(replies, ["PRIVMSG #ops :Permission denied."]);
    assert!(!bot.manager.is_loaded("noop"));
}

#[tokio::test]
async fn test_identified_requirement() {
    let bot = Harness::new(json!({
        "loader": { "admins": ["*!*@admin.example"], "require_identified": true }
    }))
    .await;
    // Without identify-msg no sender is ever identified.
    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.plugins").await;
    assert_eq!(replies, ["PRIVMSG #ops :Permission denied."]);
}

#[tokio::test]
async fn test_usage_when_no_names_given() {
    let bot = Harness::new(admin_settings()).await;
    let replies = bot.say(":root!r@admin.example PRIVMSG pewter :.reload").await;
    assert_eq!(replies, ["PRIVMSG root :Usage: reload <name...>"]);
}

#[tokio::test]
async fn test_reload_through_loader() {
    let bot = Harness::new(admin_settings()).await;
    bot.say(":root!r@admin.example PRIVMSG #ops :.load storage").await;
    let before = bot.manager.plugin_as::<StoragePlugin>("storage").unwrap();

    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.reload storage").await;
    assert_eq!(replies, ["PRIVMSG #ops :Reloaded storage."]);
    let after = bot.manager.plugin_as::<StoragePlugin>("storage").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_reloaded_loader_keeps_serving() {
    let bot = Harness::new(admin_settings()).await;
    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.reload loader").await;
    assert_eq!(replies, ["PRIVMSG #ops :Reloaded loader."]);

    // The fresh instance picked up its own manager handle.
    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.plugins").await;
    assert_eq!(replies, ["PRIVMSG #ops :Loaded plugins: help, loader"]);
}

#[tokio::test]
async fn test_help_lists_and_describes_commands() {
    let bot = Harness::new(admin_settings()).await;

    let replies = bot.say(":anyone!a@b PRIVMSG #chat :.help").await;
    assert_eq!(
        replies,
        ["PRIVMSG #chat :Commands: help, load, plugins, reload, unload. Use help <command> for details."]
    );

    let replies = bot.say(":anyone!a@b PRIVMSG #chat :.help .load").await;
    assert_eq!(replies, ["PRIVMSG #chat :load <name...>: Loads plugins"]);

    let replies = bot.say(":anyone!a@b PRIVMSG #chat :.help dance").await;
    assert_eq!(replies, ["PRIVMSG #chat :No help for 'dance'."]);
}

#[tokio::test]
async fn test_help_follows_unloads() {
    let bot = Harness::new(admin_settings()).await;
    bot.manager.unload("loader").await.unwrap();

    let replies = bot.say(":anyone!a@b PRIVMSG #chat :.help").await;
    assert_eq!(
        replies,
        ["PRIVMSG #chat :Commands: help. Use help <command> for details."]
    );

    // The loader's listener left the registry with it.
    let replies = bot.say(":root!r@admin.example PRIVMSG #ops :.plugins").await;
    assert!(replies.is_empty());
}
