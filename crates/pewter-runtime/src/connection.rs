//! One IRC network connection.
//!
//! A [`Connection`] owns the session with one server: it connects, feeds
//! every received line through decoding, parsing and the [`Router`], and
//! offers the throttled send path that listeners reach through their
//! [`Context`].
//!
//! ```text
//!             connect ok            RPL_WELCOME
//! Disconnected ────► Connecting ────► LoggingIn ────► Operational
//!      ▲                 │                │                │
//!      └─── delay ◄──────┴── EOF / error / ERROR / watchdog┘
//! ```
//!
//! Each attempt gets a child [`CancellationToken`] of the connection's stop
//! token. The watchdog and [`Connection::stop`] both end an attempt by
//! cancelling it, which also abandons a dispatch that is still running.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use pewter_core::encoding::{self, Encoding};
use pewter_core::truncate::{self, SERVER_BUDGET};
use pewter_core::{
    Command, Context, Listener, Message, OutboundLine, Outbound, ParseOptions, Parser, Router,
    Truncate, TransportError, TransportResult,
};
use pewter_transport::{BoxLineWriter, Connector};

use crate::config::ServerConfig;
use crate::rotation::ServerRotation;
use crate::session;
use crate::throttle::Throttle;
use crate::watchdog::Watchdog;

/// Capability that makes the server mark messages from identified users.
pub const IDENTIFY_MSG: &str = "identify-msg";

// =============================================================================
// State
// =============================================================================

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Transport up, registration in progress.
    LoggingIn,
    /// Registration complete.
    Operational,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::LoggingIn => "logging in",
            Self::Operational => "operational",
        };
        f.write_str(name)
    }
}

/// Per-session state, reset on every (re)connect.
#[derive(Debug)]
struct Session {
    nick: String,
    host: Option<String>,
    caps: BTreeSet<String>,
    logged_in: bool,
}

impl Session {
    fn new(config: &ServerConfig) -> Self {
        Self {
            nick: config.nick.clone(),
            host: None,
            caps: BTreeSet::new(),
            logged_in: false,
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

/// A persistent, self-reconnecting connection to one IRC network.
pub struct Connection {
    config: ServerConfig,
    router: Router,
    connector: Arc<dyn Connector>,
    fallback: &'static Encoding,

    state: RwLock<ConnectionState>,
    session: RwLock<Session>,
    parser: RwLock<Parser>,
    budget: AtomicUsize,

    writer: tokio::sync::Mutex<Option<BoxLineWriter>>,
    throttle: Mutex<Throttle>,
    last_sent: RwLock<Option<String>>,
    last_received: RwLock<Option<String>>,
    connected_at: RwLock<Option<Instant>>,

    watchdog: Option<Arc<Watchdog>>,
    transient: RwLock<Vec<Arc<dyn Listener>>>,
    stop: CancellationToken,
}

impl Connection {
    /// Creates a disconnected connection. Call [`run`](Self::run) to start it.
    ///
    /// An unknown `encoding` label falls back to windows-1252; configuration
    /// validation rejects such labels beforehand.
    pub fn new(config: ServerConfig, router: Router, connector: Arc<dyn Connector>) -> Arc<Self> {
        let fallback = encoding::lookup(&config.encoding).unwrap_or(encoding::DEFAULT_FALLBACK);
        let parser = Parser::new(ParseOptions {
            own_nick: Some(config.nick.clone()),
            command_prefix: config.command_prefix,
            identify_msg: false,
            fallback_command: (!config.fallback_command.is_empty())
                .then(|| config.fallback_command.clone()),
            ..ParseOptions::default()
        });

        let connection = Arc::new(Self {
            session: RwLock::new(Session::new(&config)),
            parser: RwLock::new(parser),
            budget: AtomicUsize::new(0),
            throttle: Mutex::new(Throttle::new(config.throttle_rate, config.throttle_burst)),
            watchdog: config
                .watchdog_interval()
                .map(|interval| Arc::new(Watchdog::new(interval, config.watchdog_check()))),
            state: RwLock::new(ConnectionState::Disconnected),
            writer: tokio::sync::Mutex::new(None),
            last_sent: RwLock::new(None),
            last_received: RwLock::new(None),
            connected_at: RwLock::new(None),
            transient: RwLock::new(Vec::new()),
            stop: CancellationToken::new(),
            fallback,
            config,
            router,
            connector,
        });
        connection.recompute_budget();
        connection
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Configured server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(server = %self.config.name, from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Our nick on this session: the configured one until the server says
    /// otherwise.
    pub fn current_nick(&self) -> String {
        self.session.read().nick.clone()
    }

    /// Our host as seen by the server, once learned.
    pub fn host(&self) -> Option<String> {
        self.session.read().host.clone()
    }

    /// Capabilities enabled on this session.
    pub fn capabilities(&self) -> BTreeSet<String> {
        self.session.read().caps.clone()
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.session.read().caps.contains(cap)
    }

    /// Whether registration completed on this session.
    pub fn is_logged_in(&self) -> bool {
        self.session.read().logged_in
    }

    /// Byte budget for text relayed to other clients.
    pub fn client_budget(&self) -> usize {
        self.budget.load(Ordering::Relaxed)
    }

    /// The most recent line written.
    pub fn last_sent(&self) -> Option<String> {
        self.last_sent.read().clone()
    }

    /// The most recent line received, decoded.
    pub fn last_received(&self) -> Option<String> {
        self.last_received.read().clone()
    }

    /// Time since the transport of the current session connected.
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.read().map(|at| at.elapsed())
    }

    // ─── Session updates ────────────────────────────────────────────────────

    /// Records a nick change of our own.
    pub fn set_nick(&self, nick: impl Into<String>) {
        let nick = nick.into();
        debug!(server = %self.config.name, nick = %nick, "Own nick updated");
        self.session.write().nick = nick;
        self.recompute_budget();
    }

    /// Records the host the server shows for us.
    pub fn set_host(&self, host: impl Into<String>) {
        let host = host.into();
        debug!(server = %self.config.name, host = %host, "Own host learned");
        self.session.write().host = Some(host);
        self.recompute_budget();
    }

    /// Marks capabilities as enabled.
    pub fn enable_capabilities<I, S>(&self, caps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session.write().caps.extend(caps.into_iter().map(Into::into));
        self.recompute_budget();
    }

    /// Marks capabilities as disabled.
    pub fn disable_capabilities<I, S>(&self, caps: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut session = self.session.write();
            for cap in caps {
                session.caps.remove(cap.as_ref());
            }
        }
        self.recompute_budget();
    }

    /// Registration completed.
    pub fn mark_logged_in(&self) {
        self.session.write().logged_in = true;
        self.set_state(ConnectionState::Operational);
        info!(server = %self.config.name, nick = %self.current_nick(), "Logged in");
    }

    /// Derives the client budget and the parser's view of us from the
    /// session. Runs after every change to nick, host or capabilities.
    fn recompute_budget(&self) {
        let session = self.session.read();
        let identify_msg = session.caps.contains(IDENTIFY_MSG);
        let budget = truncate::client_budget(
            &session.nick,
            &self.config.user,
            session.host.as_deref(),
            identify_msg,
        );
        self.budget.store(budget, Ordering::Relaxed);

        let mut parser = self.parser.write();
        let options = parser.options_mut();
        options.own_nick = Some(session.nick.clone());
        options.identify_msg = identify_msg;
        trace!(server = %self.config.name, budget, identify_msg, "Client budget recomputed");
    }

    fn reset_session(&self) {
        *self.session.write() = Session::new(&self.config);
        self.throttle.lock().reset();
        self.recompute_budget();
    }

    // ─── Send path ──────────────────────────────────────────────────────────

    /// Cuts `line` to the server budget, waits for the throttle and writes
    /// it. Returns the number of characters written.
    ///
    /// Concurrent senders are written in the order they reached the throttle.
    pub async fn send_raw(&self, line: impl Into<OutboundLine>) -> TransportResult<usize> {
        let line = line.into().truncate_to(SERVER_BUDGET).into_inner();

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let wait = self.throttle.lock().reserve(Instant::now());
        if !wait.is_zero() {
            trace!(server = %self.config.name, wait_ms = wait.as_millis() as u64, "Throttling");
            tokio::time::sleep(wait).await;
        }

        *self.last_sent.write() = Some(line.clone());
        writer.write(line.as_bytes()).await?;
        trace!(server = %self.config.name, line = %line, ">>");
        Ok(line.chars().count())
    }

    /// Sends `QUIT` and stops the connection.
    pub async fn quit(&self, reason: &str) {
        if let Err(e) = self.send_raw(format!("QUIT :{reason}")).await {
            debug!(server = %self.config.name, error = %e, "QUIT not sent");
        }
        self.stop();
    }

    // ─── Receive path ───────────────────────────────────────────────────────

    /// Decodes, parses and dispatches one received line.
    pub async fn receive(self: &Arc<Self>, raw: &[u8]) -> Message {
        if let Some(watchdog) = &self.watchdog {
            watchdog.feed();
        }

        let line = encoding::decode_line(raw, self.fallback);
        trace!(server = %self.config.name, line = %line, "<<");
        *self.last_received.write() = Some(line.to_string());

        let msg = self.parser.read().parse(&line);
        self.dispatch(&msg).await;
        msg
    }

    async fn dispatch(self: &Arc<Self>, msg: &Message) {
        let ctx = self.context();
        let extra = self.transient.read().clone();
        self.router.dispatch(&ctx, msg, &extra).await;
    }

    /// A dispatch context bound to this connection.
    pub fn context(self: &Arc<Self>) -> Context {
        let outbound: Arc<dyn Outbound> = Arc::clone(self) as Arc<dyn Outbound>;
        Context::new(outbound).with(ConnectionHandle(Arc::clone(self)))
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Ends the reconnect loop and the current session.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Connects and reconnects until [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>) {
        let mut rotation = ServerRotation::new(self.config.addresses.clone());

        while !self.stop.is_cancelled() {
            let Some(address) = rotation.current().map(str::to_string) else {
                warn!(server = %self.config.name, "No addresses configured, giving up");
                break;
            };

            let logged_in = self.run_once(&address).await;
            rotation.record(logged_in);

            if self.stop.is_cancelled() {
                break;
            }
            let delay = self.config.reconnect_delay();
            info!(
                server = %self.config.name,
                delay_secs = delay.as_secs(),
                next = rotation.current().unwrap_or_default(),
                "Reconnecting"
            );
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(server = %self.config.name, "Connection stopped");
    }

    /// One connection attempt. Returns whether it got as far as logging in.
    async fn run_once(self: &Arc<Self>, address: &str) -> bool {
        self.set_state(ConnectionState::Connecting);
        info!(server = %self.config.name, address = %address, "Connecting");

        let connected = tokio::select! {
            _ = self.stop.cancelled() => Err(TransportError::Cancelled),
            result = self.connector.connect(address) => result,
        };
        let mut reader = match connected {
            Ok((reader, writer)) => {
                *self.writer.lock().await = Some(writer);
                reader
            }
            Err(e) => {
                warn!(server = %self.config.name, address = %address, error = %e, "Connection failed");
                self.set_state(ConnectionState::Disconnected);
                return false;
            }
        };

        self.reset_session();
        *self.connected_at.write() = Some(Instant::now());
        *self.transient.write() = session::transient_listeners(&self.config);

        let attempt = self.stop.child_token();
        let watchdog = self.watchdog.as_ref().map(|watchdog| {
            watchdog.reset();
            Arc::clone(watchdog).spawn(attempt.clone())
        });
        self.set_state(ConnectionState::LoggingIn);

        let connection_event = Message::synthetic(Command::Connection);
        let reason = tokio::select! {
            _ = attempt.cancelled() => Some("cancelled".to_string()),
            _ = self.dispatch(&connection_event) => None,
        };

        let reason = match reason {
            Some(reason) => reason,
            None => loop {
                let read = tokio::select! {
                    _ = attempt.cancelled() => break "cancelled".to_string(),
                    read = reader.read_line() => read,
                };
                let raw = match read {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break "closed by server".to_string(),
                    Err(e) => break e.to_string(),
                };
                let msg = tokio::select! {
                    _ = attempt.cancelled() => break "cancelled during dispatch".to_string(),
                    msg = self.receive(&raw) => msg,
                };
                if msg.is(&Command::Error) {
                    break format!("server error: {}", msg.last_param().unwrap_or_default());
                }
            },
        };

        let logged_in = self.is_logged_in();
        warn!(server = %self.config.name, address = %address, reason = %reason, logged_in, "Disconnected");

        attempt.cancel();
        if let Some(task) = watchdog
            && let Err(e) = task.await
        {
            warn!(server = %self.config.name, error = %e, "Watchdog task failed");
        }
        self.writer.lock().await.take();

        let disconnection_event = Message::synthetic(Command::Disconnection);
        tokio::select! {
            _ = self.stop.cancelled() => {}
            _ = self.dispatch(&disconnection_event) => {}
        }

        self.transient.write().clear();
        self.reset_session();
        *self.connected_at.write() = None;
        self.set_state(ConnectionState::Disconnected);
        logged_in
    }
}

#[async_trait]
impl Outbound for Connection {
    fn nick(&self) -> Option<String> {
        Some(self.current_nick())
    }

    fn client_budget(&self) -> usize {
        Connection::client_budget(self)
    }

    async fn send_raw(&self, line: OutboundLine) -> TransportResult<usize> {
        Connection::send_raw(self, line).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("nick", &self.current_nick())
            .field("budget", &self.client_budget())
            .finish()
    }
}

// =============================================================================
// ConnectionHandle
// =============================================================================

/// The connection a message arrived on, as found in the dispatch
/// [`Context`].
///
/// ```rust,ignore
/// if let Some(conn) = ctx.get::<ConnectionHandle>() {
///     let uptime = conn.uptime().unwrap_or_default();
///     ctx.reply(msg, &format!("up for {}s", uptime.as_secs())).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionHandle(Arc<Connection>);

impl ConnectionHandle {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self(connection)
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.0
    }
}

impl Deref for ConnectionHandle {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.0
    }
}
