//! Line framing for the IRC wire format.
//!
//! Incoming lines are split on `\n` with an optional preceding `\r` and handed
//! out as raw bytes; character decoding is left to the connection, which
//! knows the fallback encoding. Outgoing lines get `\r\n` appended.
//!
//! Lines longer than the limit are discarded rather than treated as fatal,
//! so one misbehaving peer message never tears down the session.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use pewter_core::TransportError;
use pewter_core::truncate::MAX_LINE_BYTES;

/// Line codec with a byte limit (terminator included).
#[derive(Debug, Clone)]
pub struct IrcLineCodec {
    /// Index of next byte to check for newline.
    next_index: usize,
    /// Maximum line length, terminator included.
    max_len: usize,
    /// Currently skipping the remainder of an overlong line.
    discarding: bool,
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl IrcLineCodec {
    /// Creates a codec with the standard 512-byte limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_BYTES)
    }

    /// Creates a codec with a custom limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// The configured limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Decoder for IrcLineCodec {
    type Item = Vec<u8>;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    if !self.discarding {
                        warn!(limit = self.max_len, "Discarding overlong line");
                    }
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) {
                debug!("End of discarded line");
                continue;
            }
            if line.len() > self.max_len {
                warn!(len = line.len(), limit = self.max_len, "Discarding overlong line");
                continue;
            }

            let line = strip_terminator(&line);
            if line.is_empty() {
                continue;
            }
            return Ok(Some(line.to_vec()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        let rest = src.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        // An unterminated final line is still a line.
        let rest = strip_terminator(&rest);
        Ok((!rest.is_empty()).then(|| rest.to_vec()))
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for IrcLineCodec {
    type Error = TransportError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), TransportError> {
        let line = line.as_ref();
        if line.len() + 2 > self.max_len {
            return Err(TransportError::LineTooLong {
                limit: self.max_len,
            });
        }
        dst.reserve(line.len() + 2);
        dst.put_slice(line);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
