//! CTCP request extraction and low-level quoting.
//!
//! CTCP requests ride inside PRIVMSG/NOTICE text delimited by `\x01`. A
//! message may carry several; a final run without a closing delimiter is
//! still accepted, as many clients send it that way.

use std::collections::HashSet;

/// The CTCP delimiter byte.
pub const DELIMITER: char = '\x01';

/// One CTCP request embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtcpRequest {
    /// The request word, uppercased (`VERSION`, `ACTION`, ...).
    pub command: String,
    /// Everything after the first space, if present.
    pub args: Option<String>,
}

impl CtcpRequest {
    /// Creates a request.
    pub fn new(command: impl Into<String>, args: Option<String>) -> Self {
        Self {
            command: command.into().to_uppercase(),
            args,
        }
    }

    /// Renders the request body including delimiters.
    pub fn encode(&self) -> String {
        match &self.args {
            Some(args) => format!("{DELIMITER}{} {args}{DELIMITER}", self.command),
            None => format!("{DELIMITER}{}{DELIMITER}", self.command),
        }
    }
}

/// Extracts every CTCP request from `text`.
///
/// Commands listed in `quoted` get their arguments run through [`unquote`].
pub fn extract(text: &str, quoted: &HashSet<String>) -> Vec<CtcpRequest> {
    let mut requests = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(DELIMITER) {
        let body_start = start + DELIMITER.len_utf8();
        let (body, next) = match rest[body_start..].find(DELIMITER) {
            Some(end) => (
                &rest[body_start..body_start + end],
                &rest[body_start + end + DELIMITER.len_utf8()..],
            ),
            None => (&rest[body_start..], ""),
        };
        if !body.is_empty() {
            let (command, args) = match body.split_once(' ') {
                Some((command, args)) => (command, Some(args)),
                None => (body, None),
            };
            let command = command.to_uppercase();
            let args = args.map(|args| {
                if quoted.contains(&command) {
                    unquote(args)
                } else {
                    args.to_string()
                }
            });
            requests.push(CtcpRequest { command, args });
        }
        rest = next;
    }
    requests
}

/// Applies CTCP low-level quoting.
///
/// `\` becomes `\\`, NUL `\0`, `\x01` `\1`, LF `\n`, CR `\r` and space `\@`.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\x01' => out.push_str("\\1"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' ' => out.push_str("\\@"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`quote`]. Unknown escapes yield the escaped character; a
/// trailing lone backslash is kept.
pub fn unquote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some('1') => out.push('\x01'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('@') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single() {
        let found = extract("\x01VERSION\x01", &HashSet::new());
        assert_eq!(found, vec![CtcpRequest::new("VERSION", None)]);
    }

    #[test]
    fn test_extract_lowercase_command_with_args() {
        let found = extract("\x01action waves hello\x01", &HashSet::new());
        assert_eq!(found[0].command, "ACTION");
        assert_eq!(found[0].args.as_deref(), Some("waves hello"));
    }

    #[test]
    fn test_extract_unterminated() {
        let found = extract("\x01PING 12345", &HashSet::new());
        assert_eq!(found, vec![CtcpRequest::new("PING", Some("12345".into()))]);
    }

    #[test]
    fn test_extract_multiple_with_text_between() {
        let found = extract("a\x01TIME\x01 b \x01PING 1\x01", &HashSet::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].command, "TIME");
        assert_eq!(found[1].command, "PING");
    }

    #[test]
    fn test_extract_applies_unquote_to_registered_commands() {
        let quoted: HashSet<String> = ["DATA".to_string()].into_iter().collect();
        let found = extract("\x01DATA a\\@b\\\\c\x01", &quoted);
        assert_eq!(found[0].args.as_deref(), Some("a b\\c"));

        let found = extract("\x01OTHER a\\@b\x01", &quoted);
        assert_eq!(found[0].args.as_deref(), Some("a\\@b"));
    }

    #[test]
    fn test_quote_unquote() {
        let raw = "a b\\c\r\n\x01\0";
        let quoted = quote(raw);
        assert!(!quoted.contains(' '));
        assert!(!quoted.contains('\x01'));
        assert_eq!(unquote(&quoted), raw);
        assert_eq!(unquote("\\x"), "x");
        assert_eq!(unquote("end\\"), "end\\");
    }

    #[test]
    fn test_encode() {
        assert_eq!(CtcpRequest::new("ping", Some("1".into())).encode(), "\x01PING 1\x01");
    }
}
