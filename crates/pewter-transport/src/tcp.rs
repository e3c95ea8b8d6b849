//! Plain TCP connector.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};

use pewter_core::{TransportError, TransportResult};

use crate::stream::{FramedLineReader, FramedLineWriter};
use crate::traits::{BoxLineReader, BoxLineWriter, Connector};

/// Default time allowed for the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to `host:port` addresses over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl TcpConnector {
    /// Creates a connector with the default handshake timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handshake timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> TransportResult<(BoxLineReader, BoxLineWriter)> {
        let failed = |reason: String| TransportError::ConnectionFailed {
            address: address.to_string(),
            reason,
        };

        debug!(address, timeout = ?self.connect_timeout, "Connecting");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| failed("timed out".to_string()))?
            .map_err(|e| failed(e.to_string()))?;
        stream.set_nodelay(true).map_err(|e| failed(e.to_string()))?;

        if let Ok(peer) = stream.peer_addr() {
            info!(address, peer = %peer, "TCP connection established");
        }
        let (read, write) = stream.into_split();
        Ok((
            Box::new(FramedLineReader::new(read)),
            Box::new(FramedLineWriter::new(write)),
        ))
    }
}
