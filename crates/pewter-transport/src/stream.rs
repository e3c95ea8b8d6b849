//! Line transports over any byte stream.
//!
//! [`StreamTransport`] frames an `AsyncRead + AsyncWrite` value with
//! [`IrcLineCodec`]. [`StreamConnector`] hands out pre-made streams in order,
//! which is how in-memory sessions (`tokio::io::duplex`) are wired up:
//!
//! ```rust,ignore
//! let (client, server) = tokio::io::duplex(4096);
//! let connector = StreamConnector::new();
//! connector.push(client);
//! let (reader, writer) = connector.connect("irc.example.net:6667").await?;
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use pewter_core::{TransportError, TransportResult};

use crate::codec::IrcLineCodec;
use crate::traits::{BoxLineReader, BoxLineWriter, Connector, LineReader, LineWriter};

// =============================================================================
// Framed halves
// =============================================================================

/// [`LineReader`] over an `AsyncRead`.
#[derive(Debug)]
pub struct FramedLineReader<R> {
    inner: FramedRead<R, IrcLineCodec>,
}

impl<R: AsyncRead + Unpin + Send> FramedLineReader<R> {
    /// Frames `reader` with the default codec.
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, IrcLineCodec::new())
    }

    /// Frames `reader` with a custom codec.
    pub fn with_codec(reader: R, codec: IrcLineCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineReader for FramedLineReader<R> {
    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
        self.inner.next().await.transpose()
    }
}

/// [`LineWriter`] over an `AsyncWrite`.
#[derive(Debug)]
pub struct FramedLineWriter<W> {
    inner: FramedWrite<W, IrcLineCodec>,
}

impl<W: AsyncWrite + Unpin + Send> FramedLineWriter<W> {
    /// Frames `writer` with the default codec.
    pub fn new(writer: W) -> Self {
        Self::with_codec(writer, IrcLineCodec::new())
    }

    /// Frames `writer` with a custom codec.
    pub fn with_codec(writer: W, codec: IrcLineCodec) -> Self {
        Self {
            inner: FramedWrite::new(writer, codec),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWriter for FramedLineWriter<W> {
    async fn write(&mut self, line: &[u8]) -> TransportResult<()> {
        // `send` flushes, so every line leaves immediately.
        self.inner.send(line).await
    }
}

// =============================================================================
// StreamTransport
// =============================================================================

/// Splits a bidirectional stream into framed line halves.
pub struct StreamTransport;

impl StreamTransport {
    /// Frames `stream`, returning its read and write halves.
    pub fn split<S>(stream: S) -> (FramedLineReader<ReadHalf<S>>, FramedLineWriter<WriteHalf<S>>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        (FramedLineReader::new(read), FramedLineWriter::new(write))
    }

    /// Like [`split`](Self::split), boxed for a [`Connector`].
    pub fn boxed<S>(stream: S) -> (BoxLineReader, BoxLineWriter)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = Self::split(stream);
        (Box::new(reader), Box::new(writer))
    }
}

// =============================================================================
// StreamConnector
// =============================================================================

enum Pending<S> {
    Stream(S),
    Failure(String),
}

/// A [`Connector`] that serves queued streams, one per attempt, and records
/// the addresses it was asked for.
///
/// An attempt with nothing queued fails with
/// [`TransportError::ConnectionFailed`].
pub struct StreamConnector<S> {
    pending: Mutex<VecDeque<Pending<S>>>,
    attempts: Mutex<Vec<String>>,
}

impl<S> Default for StreamConnector<S> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }
}

impl<S> StreamConnector<S> {
    /// Creates a connector with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a stream for the next attempt.
    pub fn push(&self, stream: S) {
        self.pending.lock().push_back(Pending::Stream(stream));
    }

    /// Queues a failed attempt.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.pending.lock().push_back(Pending::Failure(reason.into()));
    }

    /// Addresses requested so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl<S> Connector for StreamConnector<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn connect(&self, address: &str) -> TransportResult<(BoxLineReader, BoxLineWriter)> {
        self.attempts.lock().push(address.to_string());
        let next = self.pending.lock().pop_front();
        match next {
            Some(Pending::Stream(stream)) => {
                debug!(address, "Serving queued stream");
                Ok(StreamTransport::boxed(stream))
            }
            Some(Pending::Failure(reason)) => Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason,
            }),
            None => Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason: "no stream queued".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_reader_frames_lines() {
        let mock = Builder::new()
            .read(b"PING :a\r\n:srv 001 ")
            .read(b"me :hi\n")
            .build();
        let mut reader = FramedLineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), Some(b"PING :a".to_vec()));
        assert_eq!(reader.read_line().await.unwrap(), Some(b":srv 001 me :hi".to_vec()));
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_surfaces_io_errors() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = FramedLineReader::new(mock);
        assert!(matches!(reader.read_line().await, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_writer_terminates_lines() {
        let mock = Builder::new()
            .write(b"NICK pewter\r\n")
            .write(b"USER pewter 0 * :Pewter\r\n")
            .build();
        let mut writer = FramedLineWriter::new(mock);
        writer.write(b"NICK pewter").await.unwrap();
        writer.write(b"USER pewter 0 * :Pewter").await.unwrap();
    }

    #[tokio::test]
    async fn test_connector_serves_in_order() {
        let connector = StreamConnector::new();
        connector.push_failure("refused");
        let (client, mut server) = tokio::io::duplex(256);
        connector.push(client);

        assert!(matches!(
            connector.connect("a:6667").await,
            Err(TransportError::ConnectionFailed { .. })
        ));
        let (mut reader, mut writer) = connector.connect("b:6667").await.unwrap();
        assert!(connector.connect("c:6667").await.is_err());
        assert_eq!(connector.attempts(), ["a:6667", "b:6667", "c:6667"]);

        writer.write(b"PING x").await.unwrap();
        let mut buf = [0u8; 8];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING x\r\n");

        server.write_all(b"PONG x\r\n").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), Some(b"PONG x".to_vec()));
    }
}
