//! `help` command: lists the documented commands of loaded plugins.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use pewter_core::parser::fold_fullwidth;
use pewter_core::{BoxError, Context, ListenerResult, Message, Outcome};

use crate::manager::PluginManager;
use crate::plugin::{CommandDoc, PLUGINS, Plugin, PluginDescriptor, PluginLoadContext};

/// Descriptor of the help plugin.
pub const HELP_PLUGIN: PluginDescriptor =
    PluginDescriptor::new("help", HelpPlugin::create).describe("Lists documented commands");

#[distributed_slice(PLUGINS)]
static HELP: PluginDescriptor = HELP_PLUGIN;

/// The help plugin.
#[derive(Default)]
pub struct HelpPlugin {
    manager: OnceLock<Weak<PluginManager>>,
}

impl HelpPlugin {
    fn create(_config: Arc<Value>) -> Result<Arc<dyn Plugin>, BoxError> {
        Ok(Arc::new(Self::default()))
    }

    fn answer(manager: &PluginManager, topic: Option<&str>) -> String {
        let docs: BTreeMap<String, CommandDoc> = manager
            .commands()
            .into_iter()
            .map(|(_, doc)| (doc.name.to_lowercase(), doc))
            .collect();

        let Some(topic) = topic else {
            if docs.is_empty() {
                return "No commands are documented.".to_string();
            }
            let names: Vec<&str> = docs.keys().map(String::as_str).collect();
            return format!("Commands: {}. Use help <command> for details.", names.join(", "));
        };

        // Accept "help .load" as well as "help load".
        let word: String = topic
            .chars()
            .map(fold_fullwidth)
            .collect::<String>()
            .trim_start_matches(|c: char| c.is_ascii_punctuation())
            .to_lowercase();
        match docs.get(&word) {
            Some(doc) => format!(
                "{}: {}",
                doc.usage.as_deref().unwrap_or(&doc.name),
                doc.summary
            ),
            None => format!("No help for '{topic}'."),
        }
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn commands(&self) -> Vec<CommandDoc> {
        vec![CommandDoc::new("help", "Lists commands or describes one").usage("help [command]")]
    }

    async fn after_load(&self, ctx: &PluginLoadContext) -> Result<(), BoxError> {
        let first = self.manager.set(ctx.manager()).is_ok();
        debug_assert!(first, "help initialized twice");
        Ok(())
    }

    async fn on_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        if msg.bot_command() != Some("help") {
            return Ok(Outcome::Continue);
        }
        let Some(manager) = self.manager.get().and_then(Weak::upgrade) else {
            return Ok(Outcome::Continue);
        };
        let topic = msg.tail().and_then(|t| t.split_whitespace().next());
        ctx.reply(msg, &Self::answer(&manager, topic)).await?;
        Ok(Outcome::Handled)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
