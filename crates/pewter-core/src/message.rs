//! Parsed IRC messages.
//!
//! A [`Message`] is produced once per received line (or per synthetic
//! connection event) and is immutable afterwards. Origin fields derived from
//! the prefix are parsed lazily and memoized.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local};

use crate::ctcp::CtcpRequest;

// ============================================================================
// Command
// ============================================================================

/// Numeric replies the core reacts to.
pub mod numeric {
    pub const RPL_WELCOME: u16 = 1;
    pub const RPL_TRYAGAIN: u16 = 263;
    pub const RPL_ENDOFMOTD: u16 = 376;
    pub const RPL_HOSTHIDDEN: u16 = 396;
    pub const ERR_UNKNOWNCOMMAND: u16 = 421;
    pub const ERR_NOMOTD: u16 = 422;
    pub const ERR_ERRONEUSNICKNAME: u16 = 432;
    pub const ERR_NICKNAMEINUSE: u16 = 433;
    pub const ERR_NICKCOLLISION: u16 = 436;
    pub const ERR_UNAVAILRESOURCE: u16 = 437;
    pub const ERR_NOTREGISTERED: u16 = 451;
}

/// The command of a message.
///
/// Known words get their own variant; numerics keep their code; anything
/// else is kept lowercased in [`Command::Other`]. `Connection` and
/// `Disconnection` never come from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Privmsg,
    Notice,
    Ping,
    Pong,
    Join,
    Part,
    Quit,
    Nick,
    Kick,
    Mode,
    Topic,
    Invite,
    Cap,
    Authenticate,
    Error,
    /// Three-digit numeric reply.
    Numeric(u16),
    /// Synthetic: the transport just connected.
    Connection,
    /// Synthetic: the transport just went away.
    Disconnection,
    /// Any other command word, lowercased.
    Other(String),
}

impl Command {
    /// Parses a command token. Returns `None` for an empty token.
    pub fn parse(word: &str) -> Option<Self> {
        if word.is_empty() {
            return None;
        }
        if word.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(code) = word.parse::<u16>()
                && code < 1000
            {
                return Some(Self::Numeric(code));
            }
            return Some(Self::Other(word.to_string()));
        }
        let lower = word.to_ascii_lowercase();
        Some(match lower.as_str() {
            "privmsg" => Self::Privmsg,
            "notice" => Self::Notice,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "join" => Self::Join,
            "part" => Self::Part,
            "quit" => Self::Quit,
            "nick" => Self::Nick,
            "kick" => Self::Kick,
            "mode" => Self::Mode,
            "topic" => Self::Topic,
            "invite" => Self::Invite,
            "cap" => Self::Cap,
            "authenticate" => Self::Authenticate,
            "error" => Self::Error,
            _ => Self::Other(lower),
        })
    }

    /// Returns the numeric code, if this is a numeric reply.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            Self::Numeric(code) => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` for PRIVMSG and NOTICE.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Privmsg | Self::Notice)
    }

    /// Returns `true` for the synthetic connection events.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Connection | Self::Disconnection)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Privmsg => "privmsg",
            Self::Notice => "notice",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Join => "join",
            Self::Part => "part",
            Self::Quit => "quit",
            Self::Nick => "nick",
            Self::Kick => "kick",
            Self::Mode => "mode",
            Self::Topic => "topic",
            Self::Invite => "invite",
            Self::Cap => "cap",
            Self::Authenticate => "authenticate",
            Self::Error => "error",
            Self::Numeric(code) => return write!(f, "{code:03}"),
            Self::Connection => ":connection",
            Self::Disconnection => ":disconnection",
            Self::Other(word) => word,
        };
        f.write_str(word)
    }
}

// ============================================================================
// Origin
// ============================================================================

/// Fields parsed out of the message prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Origin {
    nick: Option<String>,
    ident: Option<String>,
    host: Option<String>,
    server: Option<String>,
}

impl Origin {
    fn parse(prefix: &str) -> Self {
        if prefix.contains(['!', '@']) {
            let (nick_ident, host) = match prefix.split_once('@') {
                Some((left, host)) => (left, Some(host.to_string())),
                None => (prefix, None),
            };
            let (nick, ident) = match nick_ident.split_once('!') {
                Some((nick, ident)) => (nick, Some(ident.to_string())),
                None => (nick_ident, None),
            };
            Self {
                nick: Some(nick.to_string()),
                ident,
                host,
                server: None,
            }
        } else if prefix.contains('.') {
            Self {
                server: Some(prefix.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                nick: Some(prefix.to_string()),
                ..Self::default()
            }
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// One parsed protocol line or synthetic event.
///
/// Built by [`Parser`](crate::parser::Parser); read-only afterwards.
#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) timestamp: DateTime<Local>,
    pub(crate) raw: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) command: Option<Command>,
    pub(crate) params: Vec<String>,
    pub(crate) bot_command: Option<String>,
    pub(crate) tail: Option<String>,
    pub(crate) ctcp: Vec<CtcpRequest>,
    pub(crate) private: bool,
    pub(crate) identified: Option<bool>,
    origin: OnceLock<Origin>,
}

impl Message {
    pub(crate) fn empty(raw: Option<String>) -> Self {
        Self {
            timestamp: Local::now(),
            raw,
            prefix: None,
            command: None,
            params: Vec::new(),
            bot_command: None,
            tail: None,
            ctcp: Vec::new(),
            private: false,
            identified: None,
            origin: OnceLock::new(),
        }
    }

    /// Creates a synthetic event message (`:connection`, `:disconnection`).
    pub fn synthetic(command: Command) -> Self {
        Self {
            command: Some(command),
            ..Self::empty(None)
        }
    }

    /// When the message was captured.
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// The decoded raw line, for received messages.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The origin prefix without its leading colon.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The command, or `None` when the line could not be parsed.
    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    /// Returns `true` when the message carries the given command.
    pub fn is(&self, command: &Command) -> bool {
        self.command.as_ref() == Some(command)
    }

    /// All parameters, the trailing one included.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter.
    pub fn last_param(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Bot command word (lowercased, fullwidth folded), if the text invoked one.
    pub fn bot_command(&self) -> Option<&str> {
        self.bot_command.as_deref()
    }

    /// Arguments following the bot command; `None` when empty.
    pub fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    /// CTCP requests embedded in a PRIVMSG or NOTICE.
    pub fn ctcp(&self) -> &[CtcpRequest] {
        &self.ctcp
    }

    /// Text of a PRIVMSG or NOTICE, with any identify-msg marker removed.
    pub fn text(&self) -> Option<&str> {
        match self.command {
            Some(Command::Privmsg | Command::Notice) => self.last_param(),
            _ => None,
        }
    }

    /// `Some(true)` when the sender is identified to services (identify-msg).
    pub fn identified(&self) -> Option<bool> {
        self.identified
    }

    /// Channel the message was sent to: the second-to-last parameter when it
    /// starts with `#`.
    pub fn channel_name(&self) -> Option<&str> {
        let len = self.params.len();
        if len < 2 {
            return None;
        }
        let candidate = self.params[len - 2].as_str();
        candidate.starts_with('#').then_some(candidate)
    }

    /// `true` when the message was addressed to the bot's own nick.
    pub fn is_private(&self) -> bool {
        self.private
    }

    fn origin(&self) -> &Origin {
        self.origin
            .get_or_init(|| self.prefix.as_deref().map(Origin::parse).unwrap_or_default())
    }

    /// Sender nick.
    pub fn nick(&self) -> Option<&str> {
        self.origin().nick.as_deref()
    }

    /// Sender ident (user name).
    pub fn ident(&self) -> Option<&str> {
        self.origin().ident.as_deref()
    }

    /// Sender host.
    pub fn host(&self) -> Option<&str> {
        self.origin().host.as_deref()
    }

    /// Server name, when the prefix names a server rather than a user.
    pub fn server(&self) -> Option<&str> {
        self.origin().server.as_deref()
    }

    /// Where a reply to this message should go: the channel for channel
    /// messages, the sender for private ones.
    pub fn reply_target(&self) -> Option<&str> {
        self.channel_name().or_else(|| self.nick())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return f.write_str(raw);
        }
        match &self.command {
            Some(command) => write!(f, "{command}"),
            None => f.write_str("<unparsed>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("PRIVMSG"), Some(Command::Privmsg));
        assert_eq!(Command::parse("001"), Some(Command::Numeric(1)));
        assert_eq!(Command::parse("WALLOPS"), Some(Command::Other("wallops".into())));
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_numeric_display_is_padded() {
        assert_eq!(Command::Numeric(1).to_string(), "001");
        assert_eq!(Command::Numeric(433).to_string(), "433");
        assert_eq!(Command::Connection.to_string(), ":connection");
    }

    #[test]
    fn test_origin_forms() {
        let user = Origin::parse("nick!ident@host.example");
        assert_eq!(user.nick.as_deref(), Some("nick"));
        assert_eq!(user.ident.as_deref(), Some("ident"));
        assert_eq!(user.host.as_deref(), Some("host.example"));
        assert_eq!(user.server, None);

        let server = Origin::parse("irc.example.net");
        assert_eq!(server.server.as_deref(), Some("irc.example.net"));
        assert_eq!(server.nick, None);

        let bare = Origin::parse("nick");
        assert_eq!(bare.nick.as_deref(), Some("nick"));
    }

    #[test]
    fn test_synthetic_message() {
        let msg = Message::synthetic(Command::Connection);
        assert!(msg.is(&Command::Connection));
        assert!(msg.params().is_empty());
        assert_eq!(msg.nick(), None);
        assert_eq!(msg.channel_name(), None);
    }
}
