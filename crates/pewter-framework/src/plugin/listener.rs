//! Adapts a loaded plugin to the [`Listener`] contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use pewter_core::{Context, FilterPolicy, Listener, ListenerResult, Message};

use super::Plugin;

/// The registry entry created for a loaded plugin.
///
/// Carries the plugin's name, its effective priority and the filter policy
/// read from its configuration.
pub struct PluginListener {
    name: String,
    plugin: Arc<dyn Plugin>,
    priority: i32,
    filter: Option<FilterPolicy>,
}

impl PluginListener {
    /// Wraps `plugin`, reading `filter` and `priority` overrides from `config`.
    pub fn new(
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
        config: &Value,
    ) -> serde_json::Result<Self> {
        let filter = config
            .get("filter")
            .map(FilterPolicy::deserialize)
            .transpose()?;
        let priority = config
            .get("priority")
            .and_then(Value::as_i64)
            .and_then(|p| i32::try_from(p).ok())
            .unwrap_or_else(|| plugin.priority());
        Ok(Self {
            name: name.into(),
            plugin,
            priority,
            filter,
        })
    }

    /// The wrapped plugin.
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }
}

#[async_trait]
impl Listener for PluginListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn filter(&self) -> Option<&FilterPolicy> {
        self.filter.as_ref()
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        self.plugin.on_message(ctx, msg).await
    }
}
