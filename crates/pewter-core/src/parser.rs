//! Protocol line parser.
//!
//! # Grammar
//!
//! ```text
//! line     = [ ":" prefix SPACE ] command { SPACE param } [ SPACE ":" trailing ]
//! SPACE    = U+0020 | U+3000
//! ```
//!
//! Besides the raw breakdown the parser derives the bot-level fields of a
//! [`Message`]: embedded CTCP requests, the identify-msg marker and the
//! invoked bot command.
//!
//! ```text
//! "[<own-nick><sep> ]<prefix-char><word> <rest>"
//!                      │             │      └─► tail
//!                      │             └─► bot_command (folded, lowercased)
//!                      └─► '.' or its fullwidth form ('．', '。')
//! ```
//!
//! Parsing never fails: a line without a command token yields a message whose
//! command is `None`.

use std::collections::HashSet;

use crate::ctcp;
use crate::message::{Command, Message};

/// Separators accepted between an addressed nick and the command.
const ADDRESS_SEPARATORS: [char; 4] = [':', ',', '：', '，'];

/// Parser settings. Mutated by the session as the connection learns its
/// nick and negotiates capabilities.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Our current nick, used for private detection and addressed commands.
    pub own_nick: Option<String>,
    /// Character introducing a bot command.
    pub command_prefix: char,
    /// Whether the identify-msg capability is active.
    pub identify_msg: bool,
    /// Command assigned to unprefixed private text; `None` disables it.
    pub fallback_command: Option<String>,
    /// CTCP commands whose arguments are low-level unquoted.
    pub quoted_ctcp: HashSet<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            own_nick: None,
            command_prefix: '.',
            identify_msg: false,
            fallback_command: Some("lookup".to_string()),
            quoted_ctcp: HashSet::new(),
        }
    }
}

/// Turns decoded lines into [`Message`]s.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    /// Creates a parser with the given options.
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Current options.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Mutable access to the options.
    pub fn options_mut(&mut self) -> &mut ParseOptions {
        &mut self.options
    }

    /// Parses one line (without CRLF).
    pub fn parse(&self, raw_line: &str) -> Message {
        let line = raw_line.trim_end_matches(['\r', '\n']);
        let mut msg = Message::empty(Some(line.to_string()));

        let mut rest = line;
        let mut first = next_token(&mut rest);
        if let Some(prefix) = first.and_then(|t| t.strip_prefix(':')) {
            msg.prefix = Some(prefix.to_string());
            first = next_token(&mut rest);
        }
        let Some(command) = first.and_then(Command::parse) else {
            return msg;
        };

        loop {
            rest = rest.trim_start_matches(is_separator);
            if let Some(trailing) = rest.strip_prefix(':') {
                msg.params.push(trailing.to_string());
                break;
            }
            match next_token(&mut rest) {
                Some(token) => msg.params.push(token.to_string()),
                None => break,
            }
        }
        msg.command = Some(command);

        if msg.command.as_ref().is_some_and(Command::is_message) {
            self.derive_message_fields(&mut msg);
        }
        msg
    }

    fn derive_message_fields(&self, msg: &mut Message) {
        let opts = &self.options;

        if let (Some(own), Some(target)) = (&opts.own_nick, msg.params.first()) {
            msg.private = target.eq_ignore_ascii_case(own);
        }

        if opts.identify_msg
            && let Some(text) = msg.params.last_mut()
        {
            match text.chars().next() {
                Some('+') => {
                    msg.identified = Some(true);
                    text.remove(0);
                }
                Some('-') => {
                    msg.identified = Some(false);
                    text.remove(0);
                }
                _ => {}
            }
        }

        let text = match msg.params.last() {
            Some(text) if msg.params.len() >= 2 => text.clone(),
            _ => return,
        };
        msg.ctcp = ctcp::extract(&text, &opts.quoted_ctcp);

        if msg.command != Some(Command::Privmsg) {
            return;
        }
        if let Some((word, tail)) = self.match_bot_command(&text) {
            msg.bot_command = Some(word);
            msg.tail = tail;
        } else if msg.private
            && msg.ctcp.is_empty()
            && let Some(fallback) = &opts.fallback_command
        {
            let trimmed = text.trim();
            if !trimmed.is_empty() && !trimmed.chars().all(|c| c.is_ascii_digit()) {
                msg.bot_command = Some(fallback.clone());
                msg.tail = Some(trimmed.to_string());
            }
        }
    }

    /// Matches `[<own-nick><sep>]<prefix><word>[ <rest>]`.
    fn match_bot_command(&self, text: &str) -> Option<(String, Option<String>)> {
        let opts = &self.options;
        let mut rest = text;

        if let Some(own) = &opts.own_nick
            && let Some(after) = strip_prefix_ignore_case(rest, own)
            && let Some(sep) = after.chars().next()
            && ADDRESS_SEPARATORS.contains(&sep)
        {
            rest = after[sep.len_utf8()..].trim_start_matches([' ', '\u{3000}']);
        }

        let lead = rest.chars().next()?;
        if fold_fullwidth(lead) != opts.command_prefix {
            return None;
        }
        rest = &rest[lead.len_utf8()..];

        let end = rest.find([' ', '\u{3000}']).unwrap_or(rest.len());
        let word = &rest[..end];
        if word.is_empty() {
            return None;
        }
        let word: String = word.chars().map(fold_fullwidth).collect::<String>().to_lowercase();

        let tail = rest[end..].trim_matches(|c: char| c.is_whitespace());
        let tail = (!tail.is_empty()).then(|| tail.to_string());
        Some((word, tail))
    }
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '\u{3000}'
}

/// Pops the next separator-delimited token off `rest`, skipping runs of
/// separators.
fn next_token<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let s = rest.trim_start_matches(is_separator);
    if s.is_empty() {
        *rest = s;
        return None;
    }
    let end = s.find(is_separator).unwrap_or(s.len());
    *rest = &s[end..];
    Some(&s[..end])
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Folds fullwidth ASCII forms (U+FF01..U+FF5E), the ideographic full stop
/// and the ideographic space to their halfwidth counterparts.
pub fn fold_fullwidth(ch: char) -> char {
    match ch {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0).unwrap_or(ch),
        '。' => '.',
        '\u{3000}' => ' ',
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(nick: &str) -> Parser {
        Parser::new(ParseOptions {
            own_nick: Some(nick.to_string()),
            ..ParseOptions::default()
        })
    }

    #[test]
    fn test_parse_full_line() {
        let msg = parser("bot").parse(":nick!ident@host PRIVMSG #chan :hello world");
        assert_eq!(msg.prefix(), Some("nick!ident@host"));
        assert_eq!(msg.command(), Some(&Command::Privmsg));
        assert_eq!(msg.params(), ["#chan", "hello world"]);
        assert_eq!(msg.nick(), Some("nick"));
        assert_eq!(msg.ident(), Some("ident"));
        assert_eq!(msg.host(), Some("host"));
        assert_eq!(msg.channel_name(), Some("#chan"));
        assert!(!msg.is_private());
        assert_eq!(msg.text(), Some("hello world"));
        assert_eq!(msg.bot_command(), None);
    }

    #[test]
    fn test_parse_without_prefix() {
        let msg = Parser::default().parse("PING :irc.example.net");
        assert_eq!(msg.prefix(), None);
        assert_eq!(msg.command(), Some(&Command::Ping));
        assert_eq!(msg.params(), ["irc.example.net"]);
    }

    #[test]
    fn test_numeric_command() {
        let msg = Parser::default().parse(":irc.example.net 001 bot :Welcome");
        assert_eq!(msg.command(), Some(&Command::Numeric(1)));
        assert_eq!(msg.command().unwrap().to_string(), "001");
        assert_eq!(msg.server(), Some("irc.example.net"));
    }

    #[test]
    fn test_unknown_command_is_lowercased() {
        let msg = Parser::default().parse(":srv.example WALLOPS :hi");
        assert_eq!(msg.command(), Some(&Command::Other("wallops".into())));
    }

    #[test]
    fn test_empty_and_prefix_only_lines() {
        assert!(Parser::default().parse("").command().is_none());
        assert!(Parser::default().parse("   ").command().is_none());
        assert!(Parser::default().parse(":only.prefix").command().is_none());
    }

    #[test]
    fn test_trailing_kept_when_empty_and_other_empties_dropped() {
        let msg = Parser::default().parse("TOPIC  #chan   :");
        assert_eq!(msg.params(), ["#chan", ""]);
    }

    #[test]
    fn test_ideographic_space_splits() {
        let msg = Parser::default().parse("PRIVMSG\u{3000}#c\u{3000}:a\u{3000}b");
        assert_eq!(msg.params(), ["#c", "a\u{3000}b"]);
    }

    #[test]
    fn test_trailing_keeps_embedded_spaces() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :hello   world  x");
        assert_eq!(msg.params(), ["#chan", "hello   world  x"]);
        assert_eq!(msg.text(), Some("hello   world  x"));

        let msg = parser("bot").parse(":a!b@c PRIVMSG  #chan   :  padded");
        assert_eq!(msg.params(), ["#chan", "  padded"]);
    }

    #[test]
    fn test_ctcp_args_keep_spaces() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :\x01ACTION   waves\x01");
        assert_eq!(msg.ctcp()[0].command, "ACTION");
        assert_eq!(msg.ctcp()[0].args.as_deref(), Some("  waves"));
    }

    #[test]
    fn test_bot_command_with_prefix() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :.Echo  some   text ");
        assert_eq!(msg.bot_command(), Some("echo"));
        assert_eq!(msg.tail(), Some("some   text"));
    }

    #[test]
    fn test_bot_command_without_tail() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :.help");
        assert_eq!(msg.bot_command(), Some("help"));
        assert_eq!(msg.tail(), None);
    }

    #[test]
    fn test_bot_command_fullwidth() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :．ＨＥＬＰ ｘ");
        assert_eq!(msg.bot_command(), Some("help"));
        assert_eq!(msg.tail(), Some("ｘ"));

        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :。help");
        assert_eq!(msg.bot_command(), Some("help"));
    }

    #[test]
    fn test_addressed_bot_command() {
        let msg = parser("Bot").parse(":a!b@c PRIVMSG #chan :bot: .load x y");
        assert_eq!(msg.bot_command(), Some("load"));
        assert_eq!(msg.tail(), Some("x y"));

        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :bot，．ping");
        assert_eq!(msg.bot_command(), Some("ping"));
    }

    #[test]
    fn test_lone_prefix_is_not_a_command() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG #chan :. hi");
        assert_eq!(msg.bot_command(), None);
    }

    #[test]
    fn test_private_fallback_command() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG Bot :what is rust");
        assert!(msg.is_private());
        assert_eq!(msg.channel_name(), None);
        assert_eq!(msg.bot_command(), Some("lookup"));
        assert_eq!(msg.tail(), Some("what is rust"));

        let numeric = parser("bot").parse(":a!b@c PRIVMSG bot :12345");
        assert_eq!(numeric.bot_command(), None);

        let channel = parser("bot").parse(":a!b@c PRIVMSG #c :what is rust");
        assert_eq!(channel.bot_command(), None);
    }

    #[test]
    fn test_fallback_can_be_disabled() {
        let parser = Parser::new(ParseOptions {
            own_nick: Some("bot".into()),
            fallback_command: None,
            ..ParseOptions::default()
        });
        assert_eq!(parser.parse(":a!b@c PRIVMSG bot :hello").bot_command(), None);
    }

    #[test]
    fn test_ctcp_in_privmsg_and_notice() {
        let msg = parser("bot").parse(":a!b@c PRIVMSG bot :\x01VERSION\x01");
        assert_eq!(msg.ctcp().len(), 1);
        assert_eq!(msg.ctcp()[0].command, "VERSION");
        assert_eq!(msg.bot_command(), None);

        let notice = parser("bot").parse(":a!b@c NOTICE bot :\x01PING 42\x01");
        assert_eq!(notice.ctcp()[0].args.as_deref(), Some("42"));

        let join = parser("bot").parse(":a!b@c JOIN :\x01x\x01");
        assert!(join.ctcp().is_empty());
    }

    #[test]
    fn test_identify_msg_marker() {
        let mut p = parser("bot");
        p.options_mut().identify_msg = true;

        let msg = p.parse(":a!b@c PRIVMSG #c :+.load x");
        assert_eq!(msg.identified(), Some(true));
        assert_eq!(msg.text(), Some(".load x"));
        assert_eq!(msg.bot_command(), Some("load"));

        let msg = p.parse(":a!b@c PRIVMSG #c :-hi");
        assert_eq!(msg.identified(), Some(false));
        assert_eq!(msg.text(), Some("hi"));

        let plain = parser("bot").parse(":a!b@c PRIVMSG #c :+hi");
        assert_eq!(plain.identified(), None);
        assert_eq!(plain.text(), Some("+hi"));
    }

    #[test]
    fn test_fold_fullwidth() {
        assert_eq!(fold_fullwidth('！'), '!');
        assert_eq!(fold_fullwidth('Ａ'), 'A');
        assert_eq!(fold_fullwidth('。'), '.');
        assert_eq!(fold_fullwidth('x'), 'x');
    }
}
