//! Outbound rate limiting.
//!
//! A leaky bucket measured in lines: debt drains at `rate` lines per second
//! and every send adds one. Up to `burst` lines go out back to back; after
//! that each send waits until the debt is back under the burst.
//!
//! ```text
//! debt = max(0, debt - elapsed * rate) + 1
//! wait = (debt - burst) / rate   if debt > burst
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Longest single wait handed out, whatever the configured rate.
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Leaky-bucket throttle for one connection.
#[derive(Debug, Clone)]
pub struct Throttle {
    rate: f64,
    burst: f64,
    debt: f64,
    last: Option<Instant>,
}

impl Throttle {
    /// `rate` lines per second after a burst of `burst` lines. A rate of
    /// zero disables throttling.
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            burst,
            debt: 0.0,
            last: None,
        }
    }

    /// Whether sends are ever delayed.
    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Current debt in lines.
    pub fn debt(&self) -> f64 {
        self.debt
    }

    /// Forgets previous sends, e.g. after reconnecting.
    pub fn reset(&mut self) {
        self.debt = 0.0;
        self.last = None;
    }

    /// Books one send at `now` and returns how long to wait before writing.
    ///
    /// The wait is accounted for in advance, so a caller that sleeps for the
    /// returned duration and then writes stays within the rate.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }

        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.debt = (self.debt - elapsed * self.rate).max(0.0);
        }
        self.debt += 1.0;
        self.last = Some(now);

        if self.debt > self.burst {
            Duration::try_from_secs_f64((self.debt - self.burst) / self.rate)
                .map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_rate() {
        let mut throttle = Throttle::new(2.0, 3.0);
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(throttle.reserve(start), Duration::ZERO);
        }
        assert_eq!(throttle.reserve(start), Duration::from_millis(500));
        assert_eq!(throttle.reserve(start), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debt_decays() {
        let mut throttle = Throttle::new(1.0, 1.0);
        let start = Instant::now();
        assert_eq!(throttle.reserve(start), Duration::ZERO);
        assert_eq!(throttle.reserve(start), Duration::from_secs(1));

        // Two seconds later the debt of 2 has fully drained.
        let later = start + Duration::from_secs(2);
        assert_eq!(throttle.reserve(later), Duration::ZERO);
        assert_eq!(throttle.debt(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeping_keeps_rate_bound() {
        let mut throttle = Throttle::new(4.0, 2.0);
        let start = Instant::now();
        for _ in 0..10 {
            let wait = throttle.reserve(Instant::now());
            tokio::time::sleep(wait).await;
        }
        // 10 lines, 2 free, 8 more at 4/s.
        assert_eq!(Instant::now() - start, Duration::from_secs(2));
    }

    #[test]
    fn test_tiny_rate_waits_are_capped() {
        let mut throttle = Throttle::new(1e-300, 1.0);
        let now = Instant::now();
        assert_eq!(throttle.reserve(now), Duration::ZERO);
        assert_eq!(throttle.reserve(now), MAX_WAIT);
    }

    #[test]
    fn test_zero_rate_disables() {
        let mut throttle = Throttle::new(0.0, 1.0);
        let now = Instant::now();
        for _ in 0..100 {
            assert_eq!(throttle.reserve(now), Duration::ZERO);
        }
        assert!(!throttle.is_enabled());
    }
}
