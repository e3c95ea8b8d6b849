//! Per-listener channel filters.
//!
//! A [`FilterPolicy`] maps channel names to allow/deny flags. Two keys are
//! reserved:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `:private` | messages addressed to the bot itself |
//! | `:otherwise` | any channel (or private message) without its own key |
//!
//! Messages that neither carry a channel nor are private (numerics, PING,
//! synthetic events) always pass. Channel names compare case-insensitively.
//!
//! In configuration the policy is a plain table:
//!
//! ```toml
//! [plugins.settings.echo.filter]
//! "#rust" = true
//! ":otherwise" = false
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Reserved key for private messages.
pub const PRIVATE_KEY: &str = ":private";

/// Reserved key for everything not named explicitly.
pub const OTHERWISE_KEY: &str = ":otherwise";

/// Allow/deny table keyed by lowercased channel name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPolicy {
    rules: HashMap<String, bool>,
}

impl FilterPolicy {
    /// An empty policy (allows everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule for a channel.
    pub fn channel(mut self, name: impl AsRef<str>, allow: bool) -> Self {
        self.rules.insert(name.as_ref().to_lowercase(), allow);
        self
    }

    /// Sets the rule for private messages.
    pub fn private(mut self, allow: bool) -> Self {
        self.rules.insert(PRIVATE_KEY.to_string(), allow);
        self
    }

    /// Sets the fallback rule.
    pub fn otherwise(mut self, allow: bool) -> Self {
        self.rules.insert(OTHERWISE_KEY.to_string(), allow);
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` when no rule is set.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<bool> {
        if let Some(allow) = self.rules.get(key) {
            return Some(*allow);
        }
        self.rules
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, allow)| *allow)
    }

    /// Whether `msg` may reach the listener owning this policy.
    pub fn allows(&self, msg: &Message) -> bool {
        let key = match (msg.channel_name(), msg.is_private()) {
            (Some(channel), _) => channel,
            (None, true) => PRIVATE_KEY,
            (None, false) => return true,
        };
        self.lookup(key)
            .or_else(|| self.lookup(OTHERWISE_KEY))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, Parser};

    fn parse(line: &str) -> Message {
        Parser::new(ParseOptions {
            own_nick: Some("bot".into()),
            ..ParseOptions::default()
        })
        .parse(line)
    }

    #[test]
    fn test_channel_rules() {
        let policy = FilterPolicy::new().channel("#a", true).otherwise(false);
        assert!(policy.allows(&parse(":x!y@z PRIVMSG #a :hi")));
        assert!(policy.allows(&parse(":x!y@z PRIVMSG #A :hi")));
        assert!(!policy.allows(&parse(":x!y@z PRIVMSG #b :hi")));
        assert!(!policy.allows(&parse(":x!y@z PRIVMSG bot :hi")));
    }

    #[test]
    fn test_private_key_overrides_otherwise() {
        let policy = FilterPolicy::new().private(true).otherwise(false);
        assert!(policy.allows(&parse(":x!y@z PRIVMSG bot :hi")));
        assert!(!policy.allows(&parse(":x!y@z PRIVMSG #b :hi")));
    }

    #[test]
    fn test_missing_keys_allow() {
        let policy = FilterPolicy::new().channel("#a", false);
        assert!(!policy.allows(&parse(":x!y@z PRIVMSG #a :hi")));
        assert!(policy.allows(&parse(":x!y@z PRIVMSG #b :hi")));
        assert!(policy.allows(&parse(":x!y@z PRIVMSG bot :hi")));
    }

    #[test]
    fn test_non_channel_messages_always_pass() {
        let policy = FilterPolicy::new().otherwise(false);
        assert!(policy.allows(&parse("PING :srv")));
        assert!(policy.allows(&parse(":srv.example 001 bot :welcome")));
    }

    #[test]
    fn test_deserialize_from_table() {
        let policy: FilterPolicy =
            serde_json::from_str(r##"{"#rust": true, ":otherwise": false}"##).unwrap();
        assert!(policy.allows(&parse(":x!y@z PRIVMSG #Rust :hi")));
        assert!(!policy.allows(&parse(":x!y@z PRIVMSG #go :hi")));
    }
}
