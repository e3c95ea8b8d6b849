//! Transport seams used by the connection.

use async_trait::async_trait;

use pewter_core::TransportResult;

/// Read half of a line transport.
#[async_trait]
pub trait LineReader: Send {
    /// Reads the next line without its terminator. `None` means end of stream.
    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>>;
}

/// Write half of a line transport.
#[async_trait]
pub trait LineWriter: Send {
    /// Writes one line; the terminator is added by the transport.
    async fn write(&mut self, line: &[u8]) -> TransportResult<()>;
}

/// Boxed read half.
pub type BoxLineReader = Box<dyn LineReader>;

/// Boxed write half.
pub type BoxLineWriter = Box<dyn LineWriter>;

/// Opens line transports to server addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `address` (`host:port`).
    async fn connect(&self, address: &str) -> TransportResult<(BoxLineReader, BoxLineWriter)>;
}
