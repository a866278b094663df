//! How persistently a client dials the host.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Dial retry settings for the client.
///
/// A full attempt is connect + handshake; on failure the client waits
/// `backoff` plus up to `jitter` before starting over. The jitter keeps two
/// clients that lost the same host from hammering it in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts before giving up. At least 1.
    pub attempts: u32,
    /// Limit on a single TCP connect.
    pub connect_timeout: Duration,
    /// Fixed pause between attempts.
    pub backoff: Duration,
    /// Upper bound on the random extra pause.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            connect_timeout: Duration::from_secs(5),
            backoff: Duration::from_secs(2),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn once(connect_timeout: Duration) -> Self {
        Self {
            attempts: 1,
            connect_timeout,
            backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Number of attempts, treating 0 as 1.
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Pause before the next attempt.
    pub fn next_delay(&self) -> Duration {
        let jitter_us = self.jitter.as_micros() as u64;
        let extra = if jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..=jitter_us))
        } else {
            Duration::ZERO
        };
        self.backoff + extra
    }
}
