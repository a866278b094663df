//! Heartbeat monitor: keeps an idle link talking and notices a silent one.
//!
//! On every tick of `monitor_tick`:
//!
//! 1. If established and `heartbeat_interval` has passed since the last
//!    heartbeat, send one.
//! 2. If the peer has been silent longer than `heartbeat_timeout`, send a
//!    `ConnectionCheck` probe. [`Link::is_connected`] already reports
//!    `false` at this point.
//! 3. If the silence outlasts `heartbeat_timeout + liveness_grace`, mark
//!    the link dead and stop.
//!
//! Missed ticks are skipped rather than bursted, the same way a tick loop
//! that falls behind drops frames instead of replaying them.

use blastlink_protocol::Message;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::link::Link;
use crate::state::LinkState;

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickAction {
    pub send_heartbeat: bool,
    pub liveness: Liveness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Healthy,
    /// Silent past the timeout; probe.
    Suspect,
    /// Silent past timeout plus grace; give up.
    Dead,
    /// No socket; nothing to watch.
    Gone,
}

pub(crate) fn assess(
    state: &LinkState,
    now: Instant,
    last_heartbeat: Option<Instant>,
    config: &SessionConfig,
) -> TickAction {
    if !state.connected {
        return TickAction {
            send_heartbeat: false,
            liveness: Liveness::Gone,
        };
    }

    let send_heartbeat = state.established
        && last_heartbeat
            .is_none_or(|sent| now.saturating_duration_since(sent) >= config.heartbeat_interval);

    let silence = state.silence(now);
    let liveness = if silence > config.dead_after() {
        Liveness::Dead
    } else if silence > config.heartbeat_timeout {
        Liveness::Suspect
    } else {
        Liveness::Healthy
    };

    TickAction {
        send_heartbeat,
        liveness,
    }
}

/// Runs until the link dies or `cancel` fires.
pub async fn run_heartbeat_monitor(link: Link, cancel: CancellationToken) {
    let config = link.config().clone();
    let mut ticker = tokio::time::interval(config.monitor_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_heartbeat: Option<Instant> = None;
    let mut last_stats_log = Instant::now();
    let mut suspect = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        let action = assess(&link.state(), now, last_heartbeat, &config);

        if action.send_heartbeat {
            match link.send(Message::heartbeat()) {
                Ok(()) => last_heartbeat = Some(now),
                Err(e) => debug!(error = %e, "heartbeat not queued"),
            }
        }

        match action.liveness {
            Liveness::Healthy => suspect = false,
            Liveness::Suspect => {
                if !suspect {
                    warn!(timeout = ?config.heartbeat_timeout, "peer silent, probing");
                    suspect = true;
                }
                if let Err(e) = link.send(Message::connection_check()) {
                    debug!(error = %e, "probe not queued");
                }
            }
            Liveness::Dead => {
                link.mark_dead("heartbeat timeout");
                break;
            }
            Liveness::Gone => break,
        }

        if now.saturating_duration_since(last_stats_log) >= config.stats_log_interval {
            let stats = link.stats().snapshot();
            debug!(
                sent = stats.frames_sent,
                received = stats.frames_received,
                bytes_in = stats.bytes_received,
                throttled = stats.throttled,
                protocol_errors = stats.protocol_errors,
                "link stats"
            );
            last_stats_log = now;
        }
    }
}
