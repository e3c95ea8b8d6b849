//! Per-session listeners that drive registration and keep the link alive.
//!
//! A fresh set is built for every connection attempt and dispatched ahead of
//! all plugins:
//!
//! | Listener | Priority | Reacts to |
//! |----------|----------|-----------|
//! | [`PingResponder`] | -1000 | `PING` |
//! | [`CapNegotiator`] | -900 | connect, `CAP` |
//! | [`Registrar`] | -800 | connect, 001, 396, 433/436/437, own `NICK`/`JOIN` |
//! | [`AutoJoin`] | -700 | end of MOTD (376/422) |
//! | [`TryAgainResender`] | -650 | 263 |
//! | [`CtcpResponder`] | -500 | CTCP queries |
//!
//! They reach the connection through the [`ConnectionHandle`] in the
//! dispatch context.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use pewter_core::numeric::{
    ERR_NICKCOLLISION, ERR_NICKNAMEINUSE, ERR_NOMOTD, ERR_UNAVAILRESOURCE, RPL_ENDOFMOTD,
    RPL_HOSTHIDDEN, RPL_TRYAGAIN, RPL_WELCOME,
};
use pewter_core::{BoxError, Command, Context, Listener, ListenerResult, Message, Outcome};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;

/// Builds the listeners for one session.
pub fn transient_listeners(config: &ServerConfig) -> Vec<Arc<dyn Listener>> {
    vec![
        Arc::new(PingResponder),
        Arc::new(CapNegotiator::new(config.capabilities.clone())),
        Arc::new(Registrar::new(config)),
        Arc::new(AutoJoin::new(config.channels.clone())),
        Arc::new(TryAgainResender),
        Arc::new(CtcpResponder::new(config.version_reply.clone())),
    ]
}

fn connection(ctx: &Context) -> Result<Arc<ConnectionHandle>, BoxError> {
    ctx.get::<ConnectionHandle>()
        .ok_or_else(|| "dispatch context has no connection".into())
}

// =============================================================================
// PingResponder
// =============================================================================

/// Answers server `PING`s.
#[derive(Debug, Default)]
pub struct PingResponder;

#[async_trait]
impl Listener for PingResponder {
    fn name(&self) -> &str {
        "ping-responder"
    }

    fn priority(&self) -> i32 {
        -1000
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        if msg.is(&Command::Ping) {
            let token = msg.last_param().unwrap_or_default();
            ctx.send_raw(format!("PONG :{token}")).await?;
        }
        Ok(Outcome::Continue)
    }
}

// =============================================================================
// CapNegotiator
// =============================================================================

/// IRCv3 capability negotiation.
///
/// Sends `CAP LS 302` on connect, requests the wanted capabilities the
/// server offers and ends negotiation once the server has answered.
#[derive(Debug)]
pub struct CapNegotiator {
    wanted: Vec<String>,
    offered: Mutex<BTreeSet<String>>,
}

impl CapNegotiator {
    pub fn new(wanted: Vec<String>) -> Self {
        Self {
            wanted,
            offered: Mutex::new(BTreeSet::new()),
        }
    }

    /// Wanted capabilities among `offered`, in configuration order.
    fn select(&self, offered: &BTreeSet<String>) -> Vec<String> {
        self.wanted
            .iter()
            .filter(|cap| offered.contains(cap.as_str()))
            .cloned()
            .collect()
    }

    /// Capability names of a `CAP` list, without values (`sasl=PLAIN`).
    fn names(list: &str) -> impl Iterator<Item = &str> {
        list.split_whitespace()
            .map(|cap| cap.split_once('=').map_or(cap, |(name, _)| name))
    }
}

#[async_trait]
impl Listener for CapNegotiator {
    fn name(&self) -> &str {
        "cap-negotiator"
    }

    fn priority(&self) -> i32 {
        -900
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        match msg.command() {
            Some(Command::Connection) => {
                self.offered.lock().clear();
                ctx.send_raw("CAP LS 302").await?;
            }
            Some(Command::Cap) => {
                let conn = connection(ctx)?;
                let sub = msg.param(1).unwrap_or_default().to_ascii_uppercase();
                // A `*` before the list marks a continued multi-line reply.
                let continued = msg.params().len() > 3 && msg.param(2) == Some("*");
                let list = msg.last_param().unwrap_or_default();

                match sub.as_str() {
                    "LS" => {
                        let request = {
                            let mut offered = self.offered.lock();
                            offered.extend(Self::names(list).map(str::to_string));
                            if continued {
                                return Ok(Outcome::Continue);
                            }
                            self.select(&offered)
                        };
                        if request.is_empty() {
                            ctx.send_raw("CAP END").await?;
                        } else {
                            debug!(caps = ?request, "Requesting capabilities");
                            ctx.send_raw(format!("CAP REQ :{}", request.join(" "))).await?;
                        }
                    }
                    "ACK" => {
                        let (disabled, enabled): (Vec<&str>, Vec<&str>) = list
                            .split_whitespace()
                            .partition(|cap| cap.starts_with('-'));
                        conn.enable_capabilities(enabled);
                        conn.disable_capabilities(
                            disabled.into_iter().map(|cap| cap.trim_start_matches('-')),
                        );
                        info!(
                            server = %conn.name(),
                            caps = ?conn.capabilities(),
                            "Capabilities acknowledged"
                        );
                        if !continued && !conn.is_logged_in() {
                            ctx.send_raw("CAP END").await?;
                        }
                    }
                    "NAK" => {
                        warn!(server = %conn.name(), caps = %list, "Capabilities rejected");
                        if !conn.is_logged_in() {
                            ctx.send_raw("CAP END").await?;
                        }
                    }
                    "NEW" => {
                        let new: BTreeSet<String> = Self::names(list).map(str::to_string).collect();
                        self.offered.lock().extend(new.iter().cloned());
                        let request = self.select(&new);
                        if !request.is_empty() {
                            ctx.send_raw(format!("CAP REQ :{}", request.join(" "))).await?;
                        }
                    }
                    "DEL" => {
                        let removed: Vec<&str> = Self::names(list).collect();
                        {
                            let mut offered = self.offered.lock();
                            for cap in &removed {
                                offered.remove(*cap);
                            }
                        }
                        conn.disable_capabilities(removed);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(Outcome::Continue)
    }
}

// =============================================================================
// Registrar
// =============================================================================

/// Registration (`PASS`/`NICK`/`USER`), nick fallback, NickServ identify and
/// tracking of our own nick and host.
#[derive(Debug)]
pub struct Registrar {
    password: Option<String>,
    nickserv_password: Option<String>,
    user: String,
    realname: String,
}

impl Registrar {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            password: config.password.clone(),
            nickserv_password: config.nickserv_password.clone(),
            user: config.user.clone(),
            realname: config.realname.clone(),
        }
    }

    fn is_own(conn: &ConnectionHandle, msg: &Message) -> bool {
        msg.nick()
            .is_some_and(|nick| nick.eq_ignore_ascii_case(&conn.current_nick()))
    }
}

#[async_trait]
impl Listener for Registrar {
    fn name(&self) -> &str {
        "registrar"
    }

    fn priority(&self) -> i32 {
        -800
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        let Some(command) = msg.command() else {
            return Ok(Outcome::Continue);
        };
        let conn = connection(ctx)?;

        match command {
            Command::Connection => {
                if let Some(password) = &self.password {
                    ctx.send_raw(format!("PASS {password}")).await?;
                }
                ctx.send_raw(format!("NICK {}", conn.current_nick())).await?;
                ctx.send_raw(format!("USER {} 0 * :{}", self.user, self.realname))
                    .await?;
            }
            Command::Numeric(ERR_NICKNAMEINUSE | ERR_NICKCOLLISION | ERR_UNAVAILRESOURCE)
                if !conn.is_logged_in() =>
            {
                let nick = format!("{}_", conn.current_nick());
                warn!(server = %conn.name(), nick = %nick, "Nick unavailable, trying another");
                conn.set_nick(nick.as_str());
                ctx.send_raw(format!("NICK {nick}")).await?;
            }
            Command::Numeric(RPL_WELCOME) => {
                if let Some(nick) = msg.param(0) {
                    conn.set_nick(nick);
                }
                // "Welcome to the network nick!user@host"
                if let Some(host) = msg
                    .last_param()
                    .and_then(|text| text.split_whitespace().last())
                    .and_then(|mask| mask.split_once('@'))
                    .map(|(_, host)| host)
                    .filter(|host| !host.is_empty())
                {
                    conn.set_host(host);
                }
                conn.mark_logged_in();
                if let Some(password) = &self.nickserv_password {
                    debug!(server = %conn.name(), "Identifying to NickServ");
                    ctx.privmsg("NickServ", &format!("IDENTIFY {password}")).await?;
                }
            }
            Command::Numeric(RPL_HOSTHIDDEN) => {
                if let Some(host) = msg.param(1) {
                    conn.set_host(host);
                }
            }
            Command::Nick if Self::is_own(&conn, msg) => {
                if let Some(nick) = msg.last_param() {
                    conn.set_nick(nick);
                }
            }
            Command::Join if Self::is_own(&conn, msg) => {
                if let Some(host) = msg.host() {
                    conn.set_host(host);
                }
            }
            _ => {}
        }
        Ok(Outcome::Continue)
    }
}

// =============================================================================
// AutoJoin
// =============================================================================

/// Joins the configured channels once the MOTD has been received.
#[derive(Debug)]
pub struct AutoJoin {
    channels: Vec<String>,
    joined: AtomicBool,
}

impl AutoJoin {
    pub fn new(channels: Vec<String>) -> Self {
        Self {
            channels,
            joined: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Listener for AutoJoin {
    fn name(&self) -> &str {
        "auto-join"
    }

    fn priority(&self) -> i32 {
        -700
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        if matches!(
            msg.command(),
            Some(Command::Numeric(RPL_ENDOFMOTD | ERR_NOMOTD))
        ) && !self.joined.swap(true, Ordering::SeqCst)
        {
            for channel in &self.channels {
                // "#chan key" joins with a key.
                ctx.send_raw(format!("JOIN {channel}")).await?;
            }
        }
        Ok(Outcome::Continue)
    }
}

// =============================================================================
// TryAgainResender
// =============================================================================

/// Resends the last line when the server answers RPL_TRYAGAIN.
#[derive(Debug, Default)]
pub struct TryAgainResender;

#[async_trait]
impl Listener for TryAgainResender {
    fn name(&self) -> &str {
        "try-again"
    }

    fn priority(&self) -> i32 {
        -650
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        if msg.is(&Command::Numeric(RPL_TRYAGAIN)) {
            let conn = connection(ctx)?;
            if let Some(line) = conn.last_sent() {
                debug!(server = %conn.name(), line = %line, "Server asked to try again");
                conn.send_raw(line).await?;
            }
        }
        Ok(Outcome::Continue)
    }
}

// =============================================================================
// CtcpResponder
// =============================================================================

/// CTCP queries this responder answers.
pub const CTCP_COMMANDS: &[&str] = &["CLIENTINFO", "PING", "SOURCE", "TIME", "VERSION"];

/// Answers standard CTCP queries sent by PRIVMSG.
///
/// A message whose every query was answered stops here; anything else (such
/// as `ACTION`) continues to the plugins.
#[derive(Debug)]
pub struct CtcpResponder {
    version: String,
}

impl CtcpResponder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn answer(&self, command: &str, args: Option<&str>) -> Option<String> {
        match command {
            "VERSION" => Some(self.version.clone()),
            "PING" => Some(args.unwrap_or_default().to_string()),
            "TIME" => Some(chrono::Local::now().to_rfc2822()),
            "CLIENTINFO" => Some(
                std::iter::once("ACTION")
                    .chain(CTCP_COMMANDS.iter().copied())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "SOURCE" => Some(env!("CARGO_PKG_REPOSITORY").to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Listener for CtcpResponder {
    fn name(&self) -> &str {
        "ctcp-responder"
    }

    fn priority(&self) -> i32 {
        -500
    }

    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
        if !msg.is(&Command::Privmsg) || msg.ctcp().is_empty() {
            return Ok(Outcome::Continue);
        }

        let mut answered_all = true;
        for request in msg.ctcp() {
            match self.answer(&request.command, request.args.as_deref()) {
                Some(reply) => {
                    let args = (!reply.is_empty()).then_some(reply.as_str());
                    ctx.ctcp_reply(msg, &request.command, args).await?;
                }
                None => answered_all = false,
            }
        }

        Ok(if answered_all {
            Outcome::Handled
        } else {
            Outcome::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pewter_core::{ParseOptions, Parser, RecordingOutbound};

    fn parse(line: &str) -> Message {
        Parser::new(ParseOptions {
            own_nick: Some("pewter".into()),
            ..ParseOptions::default()
        })
        .parse(line)
    }

    fn recorder() -> (Arc<RecordingOutbound>, Context) {
        let out = Arc::new(RecordingOutbound::new("pewter"));
        let ctx = Context::new(out.clone());
        (out, ctx)
    }

    #[tokio::test]
    async fn test_ping_responder() {
        let (out, ctx) = recorder();
        let outcome = PingResponder
            .receive_message(&ctx, &parse("PING :irc.example.net"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(out.sent(), ["PONG :irc.example.net"]);
    }

    #[tokio::test]
    async fn test_auto_join_once() {
        let (out, ctx) = recorder();
        let join = AutoJoin::new(vec!["#a".into(), "#b key".into()]);
        join.receive_message(&ctx, &parse(":srv 376 pewter :End of MOTD"))
            .await
            .unwrap();
        join.receive_message(&ctx, &parse(":srv 422 pewter :No MOTD"))
            .await
            .unwrap();
        assert_eq!(out.sent(), ["JOIN #a", "JOIN #b key"]);
    }

    #[tokio::test]
    async fn test_ctcp_responder() {
        let (out, ctx) = recorder();
        let ctcp = CtcpResponder::new("Pewter test");

        let outcome = ctcp
            .receive_message(&ctx, &parse(":al!a@h PRIVMSG pewter :\x01VERSION\x01"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Handled);

        ctcp.receive_message(&ctx, &parse(":al!a@h PRIVMSG #c :\x01PING 1234\x01"))
            .await
            .unwrap();
        ctcp.receive_message(&ctx, &parse(":al!a@h PRIVMSG pewter :\x01CLIENTINFO\x01"))
            .await
            .unwrap();

        assert_eq!(
            out.take(),
            [
                "NOTICE al :\x01VERSION Pewter test\x01",
                "NOTICE al :\x01PING 1234\x01",
                "NOTICE al :\x01CLIENTINFO ACTION CLIENTINFO PING SOURCE TIME VERSION\x01",
            ]
        );
    }

    #[tokio::test]
    async fn test_ctcp_action_passes_through() {
        let (out, ctx) = recorder();
        let outcome = CtcpResponder::new("v")
            .receive_message(&ctx, &parse(":al!a@h PRIVMSG #c :\x01ACTION waves\x01"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert!(out.sent().is_empty());
    }

    #[test]
    fn test_cap_names_strip_values() {
        let names: Vec<_> = CapNegotiator::names("sasl=PLAIN,EXTERNAL identify-msg").collect();
        assert_eq!(names, ["sasl", "identify-msg"]);
    }

    #[tokio::test]
    async fn test_listeners_without_connection_fail() {
        let (_out, ctx) = recorder();
        let result = Registrar::new(&ServerConfig::new("t", "h:1", "pewter"))
            .receive_message(&ctx, &parse(":srv 001 pewter :Welcome"))
            .await;
        assert!(result.is_err());
    }
}
