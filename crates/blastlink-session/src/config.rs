//! Timing and sizing knobs for one peer connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for the receive loop, heartbeat monitor, and throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How often a heartbeat is sent while established.
    pub heartbeat_interval: Duration,

    /// Silence after which the peer is no longer considered connected and
    /// a `ConnectionCheck` probe goes out. Must exceed `heartbeat_interval`
    /// by a comfortable margin to tolerate jitter.
    pub heartbeat_timeout: Duration,

    /// Extra silence tolerated after `heartbeat_timeout` before the link is
    /// declared dead.
    pub liveness_grace: Duration,

    /// Period of the heartbeat monitor.
    pub monitor_tick: Duration,

    /// Upper bound on one socket read, which is also the worst-case
    /// shutdown latency of the receive loop.
    pub read_timeout: Duration,

    /// Minimum spacing between two transmitted player states.
    pub player_state_interval: Duration,

    /// Consecutive undecodable frames tolerated before the link is dropped.
    pub max_protocol_errors: u32,

    /// Frames that may wait for the writer before sends start failing.
    pub outbound_capacity: usize,

    /// How often the monitor logs a stats snapshot at debug level.
    pub stats_log_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(10),
            liveness_grace: Duration::from_secs(10),
            monitor_tick: Duration::from_millis(500),
            read_timeout: Duration::from_millis(100),
            player_state_interval: Duration::from_millis(50),
            max_protocol_errors: 8,
            outbound_capacity: 256,
            stats_log_interval: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Fix values that would make the background tasks spin or never
    /// fire. Called by [`Link::new`](crate::Link::new).
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.monitor_tick.is_zero() {
            warn!("monitor_tick is zero, using default");
            self.monitor_tick = defaults.monitor_tick;
        }
        if self.read_timeout.is_zero() {
            warn!("read_timeout is zero, using default");
            self.read_timeout = defaults.read_timeout;
        }
        if self.heartbeat_interval.is_zero() {
            warn!("heartbeat_interval is zero, using default");
            self.heartbeat_interval = defaults.heartbeat_interval;
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            let fixed = self.heartbeat_interval * 3;
            warn!(
                timeout = ?self.heartbeat_timeout,
                interval = ?self.heartbeat_interval,
                fixed = ?fixed,
                "heartbeat_timeout must exceed heartbeat_interval"
            );
            self.heartbeat_timeout = fixed;
        }
        self.max_protocol_errors = self.max_protocol_errors.max(1);
        self.outbound_capacity = self.outbound_capacity.max(1);
        self
    }

    /// Total silence after which the link is torn down.
    pub fn dead_after(&self) -> Duration {
        self.heartbeat_timeout + self.liveness_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(10));
        assert_eq!(config.player_state_interval, Duration::from_millis(50));
        assert_eq!(config.dead_after(), Duration::from_secs(20));
    }

    #[test]
    fn test_validated_keeps_sane_config() {
        let config = SessionConfig::default();
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_validated_fixes_timeout_below_interval() {
        let config = SessionConfig {
            heartbeat_interval: Duration::from_secs(2),
            heartbeat_timeout: Duration::from_secs(1),
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(6));
    }

    #[test]
    fn test_validated_replaces_zero_durations() {
        let config = SessionConfig {
            monitor_tick: Duration::ZERO,
            read_timeout: Duration::ZERO,
            max_protocol_errors: 0,
            outbound_capacity: 0,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.monitor_tick, Duration::from_millis(500));
        assert_eq!(config.read_timeout, Duration::from_millis(100));
        assert_eq!(config.max_protocol_errors, 1);
        assert_eq!(config.outbound_capacity, 1);
    }
}
