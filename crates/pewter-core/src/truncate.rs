//! Outbound line truncation.
//!
//! Servers accept at most 512 bytes per line including CRLF, and relay our
//! messages to other clients with our full hostmask prepended. Two budgets
//! follow from that:
//!
//! ```text
//! server budget = 512 - 2 (CRLF)
//! client budget = server budget - len(":nick!user@host ") - identify marker
//! ```
//!
//! A line that has been truncated once is wrapped in [`Truncated`] and is
//! never cut again.

use std::fmt;

/// Maximum protocol line length including CRLF.
pub const MAX_LINE_BYTES: usize = 512;

/// Budget for a line we write, CRLF excluded.
pub const SERVER_BUDGET: usize = MAX_LINE_BYTES - 2;

/// Host length assumed before the server tells us our real host.
pub const ASSUMED_HOST_LEN: usize = 63;

/// A line already cut to some budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Truncated(String);

impl Truncated {
    /// The truncated text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps the text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Truncated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Truncated {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A line on its way to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundLine {
    /// Not yet truncated.
    Raw(String),
    /// Already truncated; passed through unchanged.
    Truncated(Truncated),
}

impl OutboundLine {
    /// The line text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Raw(text) => text,
            Self::Truncated(text) => text.as_str(),
        }
    }
}

impl From<String> for OutboundLine {
    fn from(line: String) -> Self {
        Self::Raw(line)
    }
}

impl From<&str> for OutboundLine {
    fn from(line: &str) -> Self {
        Self::Raw(line.to_string())
    }
}

impl From<Truncated> for OutboundLine {
    fn from(line: Truncated) -> Self {
        Self::Truncated(line)
    }
}

/// Values that can be cut to a byte budget.
pub trait Truncate {
    /// Returns the longest prefix of at most `budget` bytes that ends on a
    /// char boundary and contains no CR or LF.
    fn truncate_to(self, budget: usize) -> Truncated;
}

impl Truncate for String {
    fn truncate_to(mut self, budget: usize) -> Truncated {
        if let Some(pos) = self.find(['\r', '\n']) {
            self.truncate(pos);
        }
        if self.len() > budget {
            let mut cut = budget;
            while !self.is_char_boundary(cut) {
                cut -= 1;
            }
            self.truncate(cut);
        }
        Truncated(self)
    }
}

impl Truncate for &str {
    fn truncate_to(self, budget: usize) -> Truncated {
        self.to_string().truncate_to(budget)
    }
}

impl Truncate for Truncated {
    fn truncate_to(self, _budget: usize) -> Truncated {
        self
    }
}

impl Truncate for OutboundLine {
    fn truncate_to(self, budget: usize) -> Truncated {
        match self {
            Self::Raw(text) => text.truncate_to(budget),
            Self::Truncated(text) => text,
        }
    }
}

/// Budget for message text relayed to other clients.
///
/// `host` of `None` assumes [`ASSUMED_HOST_LEN`]. One more byte is reserved
/// when identify-msg is active, since the server prepends a `+`/`-`.
pub fn client_budget(nick: &str, user: &str, host: Option<&str>, identify_msg: bool) -> usize {
    let host_len = host.map_or(ASSUMED_HOST_LEN, str::len);
    // ":" nick "!" user "@" host " "
    let overhead = 1 + nick.len() + 1 + user.len() + 1 + host_len + 1;
    SERVER_BUDGET
        .saturating_sub(overhead)
        .saturating_sub(usize::from(identify_msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_untouched() {
        assert_eq!("PING :x".truncate_to(SERVER_BUDGET).as_str(), "PING :x");
    }

    #[test]
    fn test_cut_on_char_boundary() {
        let line = "é".repeat(300);
        let cut = line.truncate_to(11);
        assert_eq!(cut.as_str().len(), 10);
        assert_eq!(cut.as_str(), "é".repeat(5));
    }

    #[test]
    fn test_every_budget_is_respected() {
        let line = "aé世🎉".repeat(40);
        for budget in 0..line.len() + 2 {
            let cut = line.as_str().truncate_to(budget);
            assert!(cut.as_str().len() <= budget);
            assert!(line.starts_with(cut.as_str()));
            assert!(cut.as_str().len() + 4 > budget.min(line.len()));
        }
    }

    #[test]
    fn test_truncated_is_never_cut_again() {
        let once = "x".repeat(100).truncate_to(50);
        let twice = once.clone().truncate_to(10);
        assert_eq!(once, twice);
        assert_eq!(OutboundLine::from(once.clone()).truncate_to(1), once);
    }

    #[test]
    fn test_line_breaks_end_the_line() {
        let cut = "PRIVMSG #c :hi\r\nQUIT".truncate_to(SERVER_BUDGET);
        assert_eq!(cut.as_str(), "PRIVMSG #c :hi");
    }

    #[test]
    fn test_client_budget() {
        // ":bot!bot@" + 63 + " " = 73
        assert_eq!(client_budget("bot", "bot", None, false), 510 - 73);
        assert_eq!(client_budget("bot", "bot", None, true), 510 - 74);
        assert_eq!(client_budget("bot", "bot", Some("h.example"), false), 510 - 19);
    }
}
