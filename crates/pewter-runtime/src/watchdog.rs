//! Connection liveness watchdog.
//!
//! Every received line feeds the watchdog. A background task checks every
//! `check_every`; once the silence exceeds `interval` it cancels the
//! connection's attempt token, which makes the read loop reconnect.
//!
//! The watchdog is disarmed until the first line of a connection arrives,
//! so a slow server greeting is never mistaken for a dead link.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Silence detector for one connection.
#[derive(Debug)]
pub struct Watchdog {
    last_seen: Mutex<Option<Instant>>,
    interval: Duration,
    check_every: Duration,
}

impl Watchdog {
    pub fn new(interval: Duration, check_every: Duration) -> Self {
        Self {
            last_seen: Mutex::new(None),
            interval,
            check_every,
        }
    }

    /// Maximum allowed silence.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Disarms the watchdog until the next [`feed`](Self::feed).
    pub fn reset(&self) {
        *self.last_seen.lock() = None;
    }

    /// Records that a line was received now.
    pub fn feed(&self) {
        *self.last_seen.lock() = Some(Instant::now());
    }

    /// Whether the connection has been silent for longer than the interval
    /// at `now`. Always `false` before the first line.
    pub fn expired(&self, now: Instant) -> bool {
        match *self.last_seen.lock() {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => false,
        }
    }

    /// Spawns the checking task. It cancels `token` on expiry and exits
    /// when `token` is cancelled by anyone.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.check_every) => {}
                }

                if self.expired(Instant::now()) {
                    warn!(
                        interval_secs = self.interval.as_secs(),
                        "No data received within watchdog interval, dropping connection"
                    );
                    token.cancel();
                    break;
                }
            }
            debug!("Watchdog stopped");
        })
    }
}
