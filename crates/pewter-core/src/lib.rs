//! # Pewter Core
//!
//! The message routing engine of the Pewter IRC bot framework.
//!
//! This crate turns protocol lines into [`Message`]s and delivers them to a
//! priority-ordered chain of [`Listener`]s. It knows nothing about sockets or
//! plugins; those live in `pewter-transport` and `pewter-framework`.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ encoding::decode_line ──▶ Parser::parse ──▶ Message
//!                                                          │
//!            ┌─────────────────────────────────────────────┘
//!            ▼
//!       ┌────────┐     ┌──────────────────┐     ┌──────────┐
//!       │ Router │────▶│ ListenerRegistry │────▶│ Listener │──▶ Context::reply
//!       └────────┘     │ (+ transient)    │────▶│ Listener │
//!                      └──────────────────┘     └──────────┘
//! ```
//!
//! ## Layers
//!
//! - **Protocol**: [`Message`], [`Command`], [`Parser`], [`ctcp`], [`encoding`], [`truncate`]
//! - **Dispatch**: [`Listener`], [`FilterPolicy`], [`ListenerRegistry`], [`Router`]
//! - **Outbound**: [`Context`], [`Outbound`]

pub mod context;
pub mod ctcp;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod listener;
pub mod message;
pub mod parser;
pub mod registry;
pub mod router;
pub mod truncate;

pub use context::{Context, Outbound, RecordingOutbound};
pub use ctcp::CtcpRequest;
pub use error::{BoxError, TransportError, TransportResult};
pub use filter::FilterPolicy;
pub use listener::{Listener, ListenerResult, Outcome};
pub use message::{Command, Message, numeric};
pub use parser::{ParseOptions, Parser};
pub use registry::ListenerRegistry;
pub use router::{DispatchSummary, Router};
pub use truncate::{OutboundLine, Truncate, Truncated};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        BoxError, Command, Context, FilterPolicy, Listener, ListenerResult, Message, Outcome,
    };
    pub use async_trait::async_trait;
}
