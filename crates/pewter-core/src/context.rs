//! Dispatch context.
//!
//! A [`Context`] is handed to every listener together with the message. It
//! carries the connection's send path ([`Outbound`]) and a typed extension
//! map for request-scoped data, replacing any need for globals.
//!
//! ```rust,ignore
//! async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
//!     if msg.bot_command() == Some("ping") {
//!         ctx.reply(msg, "pong").await?;
//!         return Ok(Outcome::Handled);
//!     }
//!     Ok(Outcome::Continue)
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::ctcp::CtcpRequest;
use crate::error::TransportResult;
use crate::message::Message;
use crate::truncate::{self, OutboundLine, Truncate};

// =============================================================================
// Outbound
// =============================================================================

/// The send side of a connection, as seen by listeners.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Our current nick, once known.
    fn nick(&self) -> Option<String>;

    /// Byte budget for text relayed to other clients.
    fn client_budget(&self) -> usize;

    /// Truncates to the server budget, throttles and writes one line.
    /// Returns the number of characters written.
    async fn send_raw(&self, line: OutboundLine) -> TransportResult<usize>;
}

/// An [`Outbound`] that records lines instead of sending them.
///
/// Useful in tests and for dry runs.
#[derive(Debug)]
pub struct RecordingOutbound {
    nick: Option<String>,
    budget: usize,
    sent: Mutex<Vec<String>>,
}

impl RecordingOutbound {
    /// Creates a recorder that reports `nick` and the default client budget.
    pub fn new(nick: impl Into<String>) -> Self {
        let nick = nick.into();
        let budget = truncate::client_budget(&nick, &nick, None, false);
        Self {
            nick: Some(nick),
            budget,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Lines sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Drains the recorded lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    fn nick(&self) -> Option<String> {
        self.nick.clone()
    }

    fn client_budget(&self) -> usize {
        self.budget
    }

    async fn send_raw(&self, line: OutboundLine) -> TransportResult<usize> {
        let line = line.truncate_to(truncate::SERVER_BUDGET).into_inner();
        let count = line.chars().count();
        self.sent.lock().push(line);
        Ok(count)
    }
}

// =============================================================================
// Context
// =============================================================================

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Per-dispatch context shared by every listener of one message.
pub struct Context {
    outbound: Arc<dyn Outbound>,
    extensions: RwLock<Extensions>,
}

impl Context {
    /// Creates a context around a send path.
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            outbound,
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// Adds an extension (builder pattern).
    pub fn with<T: Any + Send + Sync>(self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Stores a value keyed by its type, replacing any previous one.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.extensions
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Retrieves a value by type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let ext = self.extensions.read().get(&TypeId::of::<T>()).cloned()?;
        ext.downcast::<T>().ok()
    }

    /// The send path.
    pub fn outbound(&self) -> &Arc<dyn Outbound> {
        &self.outbound
    }

    /// Our current nick.
    pub fn nick(&self) -> Option<String> {
        self.outbound.nick()
    }

    /// Sends a raw protocol line.
    pub async fn send_raw(&self, line: impl Into<OutboundLine>) -> TransportResult<usize> {
        self.outbound.send_raw(line.into()).await
    }

    async fn send_text(&self, verb: &str, target: &str, text: &str) -> TransportResult<usize> {
        let line = format!("{verb} {target} :{text}").truncate_to(self.outbound.client_budget());
        self.outbound.send_raw(line.into()).await
    }

    /// Sends a PRIVMSG, cut to the client budget.
    pub async fn privmsg(&self, target: &str, text: &str) -> TransportResult<usize> {
        self.send_text("PRIVMSG", target, text).await
    }

    /// Sends a NOTICE, cut to the client budget.
    pub async fn notice(&self, target: &str, text: &str) -> TransportResult<usize> {
        self.send_text("NOTICE", target, text).await
    }

    /// Replies where `msg` came from: its channel, else its sender.
    ///
    /// Messages without either (server notices, synthetic events) are
    /// dropped with a warning and `Ok(0)`.
    pub async fn reply(&self, msg: &Message, text: &str) -> TransportResult<usize> {
        match msg.reply_target() {
            Some(target) => self.privmsg(target, text).await,
            None => {
                warn!(command = ?msg.command(), "Reply dropped: message has no reply target");
                Ok(0)
            }
        }
    }

    /// Answers a CTCP request with a NOTICE to the sender.
    pub async fn ctcp_reply(
        &self,
        msg: &Message,
        command: &str,
        args: Option<&str>,
    ) -> TransportResult<usize> {
        let Some(nick) = msg.nick() else {
            return Ok(0);
        };
        let body = CtcpRequest::new(command, args.map(str::to_string)).encode();
        self.notice(nick, &body).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("nick", &self.outbound.nick())
            .field("extension_count", &self.extensions.read().len())
            .finish()
    }
}
