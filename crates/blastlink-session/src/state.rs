//! Connection lifecycle and liveness flags.
//!
//! Two views of the same connection live here:
//!
//! - [`LinkPhase`] is the coarse lifecycle, mostly for logs and UI
//!   ("waiting for a friend", "connecting", "connected").
//! - [`LinkState`] carries the flags the rest of the crate actually
//!   decides on: `connected`, `established`, when the peer was last heard.
//!
//! `LinkState` is published through a `tokio::sync::watch` channel by
//! [`Link`](crate::Link), so the handshake and the reconnect supervisor can
//! wait on a predicate instead of polling.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use blastlink_protocol::{GameOverReason, PlayerId};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Where a peer is in its connection lifecycle.
///
/// Host path:
///
/// ```text
/// Idle → Listening → Accepting → HandshakeSent → Established → Lost → Closed
/// ```
///
/// Client path (the `Dialing ↔ AwaitingAccept` pair repeats per attempt,
/// and `Lost → Dialing` on a reconnect):
///
/// ```text
/// Idle → Dialing → AwaitingAccept → Established → Lost → Closed
///                                 ↘ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkPhase {
    Idle,
    Listening,
    Accepting,
    HandshakeSent,
    Dialing,
    AwaitingAccept,
    Established,
    /// The established socket went away. A reconnect may follow.
    Lost,
    /// Gave up: accept timed out, or every dial attempt failed.
    Failed,
    /// The session ended, by either side.
    Closed,
}

impl LinkPhase {
    /// Returns `true` once nothing more will happen on this link.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Listening => write!(f, "Listening"),
            Self::Accepting => write!(f, "Accepting"),
            Self::HandshakeSent => write!(f, "HandshakeSent"),
            Self::Dialing => write!(f, "Dialing"),
            Self::AwaitingAccept => write!(f, "AwaitingAccept"),
            Self::Established => write!(f, "Established"),
            Self::Lost => write!(f, "Lost"),
            Self::Failed => write!(f, "Failed"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Snapshot of one connection's liveness.
///
/// Only [`Link`](crate::Link) mutates this, and its mutators keep
/// `established` implying `connected`.
#[derive(Debug, Clone)]
pub struct LinkState {
    pub phase: LinkPhase,
    /// A socket to the peer is open.
    pub connected: bool,
    /// The handshake completed on this socket.
    pub established: bool,
    /// A write failed. The socket may still be readable.
    pub degraded: bool,
    /// The peer said goodbye with this reason (`Disconnect` or
    /// `SessionFull`). A farewell suppresses reconnecting.
    pub farewell: Option<GameOverReason>,
    /// When the last decoded frame arrived.
    pub last_received: Instant,
    /// The local player's id, known once established.
    pub player_id: Option<PlayerId>,
    pub peer_addr: Option<SocketAddr>,
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            phase: LinkPhase::Idle,
            connected: false,
            established: false,
            degraded: false,
            farewell: None,
            last_received: Instant::now(),
            player_id: None,
            peer_addr: None,
        }
    }

    /// How long the peer has been silent as of `now`.
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_received)
    }

    /// Established and heard from within `timeout`.
    pub fn is_live(&self, now: Instant, timeout: Duration) -> bool {
        self.connected && self.established && self.silence(now) < timeout
    }

    /// The transport is gone, or writes to it started failing.
    pub fn is_lost(&self) -> bool {
        !self.connected || self.degraded
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}
