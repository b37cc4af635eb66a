use std::time::Duration;

/// Delay before the first reconnect attempt after a drop.
pub const RECONNECT_FLOOR: Duration = Duration::from_millis(3_000);
/// Ceiling for the doubled reconnect delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);

/// Capped exponential reconnect backoff. No jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Backoff {
            next: RECONNECT_FLOOR,
        }
    }

    /// Returns the delay to sleep before the next attempt and doubles
    /// the following one, capped.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (delay * 2).min(MAX_RECONNECT_DELAY);
        delay
    }

    /// Called on successful connect: the next failure starts from the
    /// floor again.
    pub fn reset(&mut self) {
        self.next = RECONNECT_FLOOR;
    }
}
