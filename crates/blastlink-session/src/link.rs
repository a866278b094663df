//! The shared handle every task of one peer connection works through.
//!
//! A [`Link`] is cheap to clone (one `Arc`). The facade, the receive loop,
//! the writer and the heartbeat monitor each hold a clone and meet in the
//! same place:
//!
//! ```text
//!  game loop ──send()──► outbound mpsc ──► writer task ──► socket
//!  game loop ◄─drain()── Inbox ◄────────── receive loop ◄── socket
//!                         LinkState (watch) ◄── everyone
//! ```
//!
//! The link outlives individual sockets: a reconnecting client attaches a
//! fresh outbound queue to the same `Link`, so the game never has to
//! swap handles.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use blastlink_protocol::{Envelope, GameOverReason, Message, PeerRole, PlayerId};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::inbox::Inbox;
use crate::state::{LinkPhase, LinkState};
use crate::stats::NetworkStats;
use crate::throttle::Throttle;

/// Whether a gameplay send went out or was rate-limited away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Throttled,
}

#[derive(Clone)]
pub struct Link {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    role: PeerRole,
    config: SessionConfig,
    state: watch::Sender<LinkState>,
    inbox: Inbox,
    stats: NetworkStats,
    outbound: Mutex<Option<mpsc::Sender<Envelope>>>,
    player_state_throttle: Mutex<Throttle>,
}

impl Link {
    pub fn new(role: PeerRole, config: SessionConfig) -> Self {
        let config = config.validated();
        let (state, _) = watch::channel(LinkState::new());
        let throttle = Throttle::new(config.player_state_interval);
        Self {
            inner: Arc::new(LinkInner {
                role,
                config,
                state,
                inbox: Inbox::new(),
                stats: NetworkStats::new(),
                outbound: Mutex::new(None),
                player_state_throttle: Mutex::new(throttle),
            }),
        }
    }

    pub fn role(&self) -> PeerRole {
        self.inner.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inner.inbox
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.inner.stats
    }

    // -----------------------------------------------------------------------
    // State queries
    // -----------------------------------------------------------------------

    /// A copy of the current state.
    pub fn state(&self) -> LinkState {
        self.inner.state.borrow().clone()
    }

    /// Watches state changes. Refreshing `last_received` does not notify.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.inner.state.subscribe()
    }

    pub fn phase(&self) -> LinkPhase {
        self.inner.state.borrow().phase
    }

    pub fn is_established(&self) -> bool {
        self.inner.state.borrow().established
    }

    /// Connected, established, and heard from within the heartbeat timeout.
    ///
    /// Computed from the last-received timestamp on every call, so it
    /// turns false the moment the timeout elapses, well before the monitor
    /// gets around to tearing the link down.
    pub fn is_connected(&self) -> bool {
        self.inner
            .state
            .borrow()
            .is_live(Instant::now(), self.inner.config.heartbeat_timeout)
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    pub fn set_phase(&self, phase: LinkPhase) {
        self.inner.state.send_if_modified(|state| {
            if state.phase == phase {
                return false;
            }
            debug!(from = %state.phase, to = %phase, "link phase");
            state.phase = phase;
            true
        });
    }

    /// A fresh socket to `peer` is open. Clears everything the previous
    /// socket left behind and starts the silence clock.
    pub fn mark_connected(&self, peer: SocketAddr) {
        self.inner.state.send_modify(|state| {
            state.connected = true;
            state.established = false;
            state.degraded = false;
            state.farewell = None;
            state.last_received = Instant::now();
            state.peer_addr = Some(peer);
        });
        self.inner
            .player_state_throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    /// Completes the handshake. Ignored unless a socket is open.
    pub fn mark_established(&self, player_id: PlayerId) -> bool {
        self.inner.state.send_if_modified(|state| {
            if !state.connected || state.established {
                return false;
            }
            state.established = true;
            state.player_id = Some(player_id);
            state.phase = LinkPhase::Established;
            true
        })
    }

    /// The socket is gone. Clears `connected` and `established` together,
    /// and moves an established link to [`LinkPhase::Lost`].
    pub fn mark_dead(&self, reason: &str) {
        let changed = self.inner.state.send_if_modified(|state| {
            if !state.connected && !state.established {
                return false;
            }
            if state.established {
                state.phase = LinkPhase::Lost;
            }
            state.connected = false;
            state.established = false;
            true
        });
        if changed {
            info!(reason, "link down");
        }
    }

    /// A write failed. Liveness is left to the receive loop and monitor.
    pub fn mark_degraded(&self) {
        self.inner.state.send_if_modified(|state| {
            let changed = !state.degraded;
            state.degraded = true;
            changed
        });
    }

    pub fn mark_farewell(&self, reason: GameOverReason) {
        self.inner.state.send_modify(|state| {
            state.farewell = Some(reason);
        });
    }

    /// Refreshes the silence clock without waking watchers.
    pub fn touch(&self) {
        self.inner.state.send_if_modified(|state| {
            state.last_received = Instant::now();
            false
        });
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Opens a fresh outbound queue for a new socket. The receiver goes to
    /// the writer task; any previous queue is dropped.
    pub fn attach(&self) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.inner.config.outbound_capacity);
        *self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Drops the outbound queue. The writer drains what is left and exits.
    pub fn detach(&self) {
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Queues `message` for the writer without waiting.
    ///
    /// Used for control traffic, which may go out before the handshake
    /// completes. A full queue refuses the message and leaves the link
    /// alone; a closed one means the writer is gone and marks the link
    /// degraded.
    pub fn send(&self, message: Message) -> Result<(), SessionError> {
        let sender = self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SessionError::NotAttached)?;

        sender.try_send(Envelope::new(message)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(rejected) => {
                debug!(kind = %rejected.kind(), "outbound queue full, message dropped");
                SessionError::OutboundFull
            }
            mpsc::error::TrySendError::Closed(_) => {
                self.mark_degraded();
                SessionError::OutboundClosed
            }
        })
    }

    /// Queues gameplay traffic. Requires an established link and applies
    /// the player-state throttle to high-frequency kinds.
    ///
    /// A throttled slot is spent even when the queue then refuses the
    /// message: a newer state follows within one interval anyway.
    pub fn send_gameplay(&self, message: Message) -> Result<SendOutcome, SessionError> {
        if !self.is_established() {
            return Err(SessionError::NotEstablished);
        }

        if message.kind().is_high_frequency() {
            let acquired = self
                .inner
                .player_state_throttle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_acquire(Instant::now());
            if !acquired {
                self.inner.stats.record_throttled();
                return Ok(SendOutcome::Throttled);
            }
        }

        self.send(message)?;
        Ok(SendOutcome::Sent)
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("role", &self.inner.role)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}
