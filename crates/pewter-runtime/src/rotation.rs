//! Round-robin server address rotation.
//!
//! A connection attempt that never completes registration moves on to the
//! next address. Logging in resets the rotation, so the first reconnect after
//! a healthy session starts from the preferred (first) address again.

/// Position in a server's address list.
#[derive(Debug, Clone)]
pub struct ServerRotation {
    addresses: Vec<String>,
    next: usize,
}

impl ServerRotation {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses, next: 0 }
    }

    /// The address to try next, `None` if there are none.
    pub fn current(&self) -> Option<&str> {
        self.addresses.get(self.next).map(String::as_str)
    }

    /// Moves to the following address, wrapping around.
    pub fn advance(&mut self) {
        if !self.addresses.is_empty() {
            self.next = (self.next + 1) % self.addresses.len();
        }
    }

    /// Back to the first address.
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Records the outcome of an attempt.
    pub fn record(&mut self, logged_in: bool) {
        if logged_in {
            self.reset();
        } else {
            self.advance();
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation() -> ServerRotation {
        ServerRotation::new(vec!["a:1".into(), "b:2".into(), "c:3".into()])
    }

    #[test]
    fn test_failed_attempts_rotate_and_wrap() {
        let mut r = rotation();
        let mut tried = Vec::new();
        for _ in 0..4 {
            tried.push(r.current().unwrap().to_string());
            r.record(false);
        }
        assert_eq!(tried, ["a:1", "b:2", "c:3", "a:1"]);
    }

    #[test]
    fn test_login_resets() {
        let mut r = rotation();
        r.record(false);
        assert_eq!(r.current(), Some("b:2"));
        r.record(true);
        assert_eq!(r.current(), Some("a:1"));
    }

    #[test]
    fn test_empty() {
        let mut r = ServerRotation::new(Vec::new());
        r.advance();
        assert!(r.is_empty());
        assert_eq!(r.current(), None);
    }
}
