//! The listener contract.
//!
//! Everything that reacts to messages (plugins, the login sequence, the
//! ping responder) implements [`Listener`] and is walked by the
//! [`Router`](crate::router::Router) in ascending [`priority`](Listener::priority).
//!
//! ```rust,ignore
//! struct Greeter;
//!
//! #[async_trait]
//! impl Listener for Greeter {
//!     fn name(&self) -> &str { "greeter" }
//!
//!     async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult {
//!         match msg.command() {
//!             Some(Command::Join) => {
//!                 ctx.reply(msg, "hello").await?;
//!                 Ok(Outcome::Handled)
//!             }
//!             _ => Ok(Outcome::Continue),
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::context::Context;
use crate::error::BoxError;
use crate::filter::FilterPolicy;
use crate::message::Message;

/// What a listener did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Pass the message on to the next listener.
    #[default]
    Continue,
    /// Stop dispatch here.
    Handled,
}

impl Outcome {
    /// `true` for [`Outcome::Handled`].
    pub fn is_handled(self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Result of [`Listener::receive_message`].
pub type ListenerResult = Result<Outcome, BoxError>;

/// A message handler in the dispatch chain.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Sort key; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Channel/private filter. `None` means the listener sees everything.
    fn filter(&self) -> Option<&FilterPolicy> {
        None
    }

    /// Handles one message.
    async fn receive_message(&self, ctx: &Context, msg: &Message) -> ListenerResult;
}
