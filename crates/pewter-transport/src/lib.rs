//! # Pewter Transport
//!
//! Line-oriented transports for the Pewter IRC bot framework.
//!
//! The connection in `pewter-runtime` only sees the three seams defined in
//! [`traits`]; this crate provides their implementations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  pewter-runtime     │  (Connection: decode, parse, dispatch)
//! ├─────────────────────┤
//! │  pewter-transport   │  <- This crate (LineReader / LineWriter)
//! ├─────────────────────┤
//! │  IrcLineCodec       │  (512-byte \r\n framing)
//! ├─────────────────────┤
//! │  TCP / any stream   │
//! └─────────────────────┘
//! ```
//!
//! | Connector | Description | Use Case |
//! |-----------|-------------|----------|
//! | [`TcpConnector`] | Plain TCP | Live servers |
//! | [`StreamConnector`] | Queued in-memory streams | Tests, embedding |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pewter_transport::{Connector, TcpConnector};
//!
//! let (mut reader, mut writer) = TcpConnector::new().connect("irc.libera.chat:6667").await?;
//! writer.write(b"NICK pewter").await?;
//! while let Some(line) = reader.read_line().await? {
//!     println!("{}", String::from_utf8_lossy(&line));
//! }
//! ```

pub mod codec;
pub mod stream;
pub mod tcp;
pub mod traits;

pub use codec::IrcLineCodec;
pub use stream::{FramedLineReader, FramedLineWriter, StreamConnector, StreamTransport};
pub use tcp::TcpConnector;
pub use traits::{BoxLineReader, BoxLineWriter, Connector, LineReader, LineWriter};
