//! Rate limit for high-frequency sends.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum spacing between transmissions.
///
/// Suppressed calls are dropped, not queued: a newer player state always
/// supersedes an older one, so there is nothing worth catching up on.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    fn is_ready(&self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Claims the next send slot if the spacing allows it at `now`.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.mark_sent(now);
            true
        } else {
            false
        }
    }

    /// Forgets the last send, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_send_always_allowed() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        assert!(throttle.try_acquire(Instant::now()));
    }

    #[test]
    fn test_burst_within_interval_allows_one() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();

        let allowed = (0..10)
            .filter(|i| throttle.try_acquire(start + Duration::from_millis(*i * 4)))
            .count();

        assert_eq!(allowed, 1);
    }

    #[test]
    fn test_allows_again_after_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();

        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start + Duration::from_millis(49)));
        assert!(throttle.try_acquire(start + Duration::from_millis(50)));
        assert!(throttle.try_acquire(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_is_ready_does_not_record() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        let now = Instant::now();

        assert!(throttle.is_ready(now));
        assert!(throttle.is_ready(now));
        throttle.mark_sent(now);
        assert!(!throttle.is_ready(now));

        throttle.reset();
        assert!(throttle.is_ready(now));
    }
}
