//! `GameNetwork`: the synchronous facade a game loop talks to.
//!
//! A game loop runs on its own thread at 60 frames per second and cannot
//! `.await`. `GameNetwork` owns a small Tokio runtime that hosts every
//! background task (accept or dial, receive loop, writer, heartbeat
//! monitor) and exposes plain, non-blocking methods:
//!
//! ```rust,no_run
//! use blastlink::prelude::*;
//!
//! let mut network = GameNetwork::new(NetworkConfig::host());
//! if !network.initialize() {
//!     panic!("could not host");
//! }
//!
//! loop {
//!     for inbound in network.get_messages() {
//!         // apply inbound.envelope.message to the game state
//!     }
//!     if network.is_connected() {
//!         // network.send_player_state(...);
//!     }
//!     # break;
//! }
//! network.disconnect();
//! ```
//!
//! Sends never block: they queue the frame for the writer task and return
//! at once. Received messages wait in an inbox until the game drains it.

use std::net::SocketAddr;

use blastlink_protocol::{
    BombPlaced, GameOverReason, Message, ObjectDestroyed, PeerRole, PlayerId, PlayerState,
    PowerupCollected, PowerupSpawned,
};
use blastlink_session::{Inbound, Link, LinkPhase, SendOutcome, SessionError, StatsSnapshot};
use blastlink_transport::{HostListener, local_ip_hint};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::{NetworkConfig, Role};
use crate::error::BlastlinkError;
use crate::establish;

const WORKER_THREADS: usize = 2;

pub struct GameNetwork {
    config: NetworkConfig,
    link: Link,
    runtime: Option<Runtime>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
    local_port: Option<u16>,
}

impl GameNetwork {
    /// Creates an idle network. Nothing touches the OS until
    /// [`initialize`](Self::initialize).
    pub fn new(config: NetworkConfig) -> Self {
        let link = Link::new(config.peer_role(), config.session.clone());
        Self {
            config,
            link,
            runtime: None,
            cancel: CancellationToken::new(),
            driver: None,
            local_port: None,
        }
    }

    /// Starts hosting or joining. Returns `false` on immediate failure,
    /// such as no bindable port; the reason is logged.
    ///
    /// For a client, `true` means the dial sequence has started, not that
    /// the host answered. Poll [`is_connected`](Self::is_connected) or
    /// [`phase`](Self::phase).
    pub fn initialize(&mut self) -> bool {
        match self.start() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, role = %self.role(), "network initialization failed");
                false
            }
        }
    }

    /// Like [`initialize`](Self::initialize), but returns the reason.
    pub fn start(&mut self) -> Result<(), BlastlinkError> {
        if self.runtime.is_some() {
            return Err(BlastlinkError::AlreadyInitialized);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("blastlink-net")
            .enable_all()
            .build()
            .map_err(BlastlinkError::Runtime)?;
        self.cancel = CancellationToken::new();

        let driver = match &self.config.role {
            Role::Host => {
                self.link.set_phase(LinkPhase::Listening);
                let bound = runtime.block_on(HostListener::bind(
                    self.config.port,
                    self.config.port_fallback_attempts,
                ));
                let listener = match bound {
                    Ok(listener) => listener,
                    Err(e) => {
                        self.link.set_phase(LinkPhase::Failed);
                        return Err(e.into());
                    }
                };

                let port = listener.port();
                let ip = runtime.block_on(local_ip_hint());
                info!(%ip, port, "hosting, tell the other player to join {ip}:{port}");
                self.local_port = Some(port);

                runtime.spawn(establish::run_host(
                    listener,
                    self.link.clone(),
                    self.config.clone(),
                    self.cancel.clone(),
                ))
            }
            Role::Client { host_ip } => {
                info!(host = %host_ip, port = self.config.port, "joining");
                self.link.set_phase(LinkPhase::Dialing);
                runtime.spawn(establish::run_client(
                    self.link.clone(),
                    self.config.clone(),
                    host_ip.clone(),
                    self.cancel.clone(),
                ))
            }
        };

        self.driver = Some(driver);
        self.runtime = Some(runtime);
        Ok(())
    }

    /// Established and heard from within the heartbeat timeout.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Sends the local player's state, at most once per
    /// `player_state_interval`. A call inside the interval is dropped and
    /// still returns `true`.
    pub fn send_player_state(&self, state: PlayerState) -> bool {
        self.send(Message::PlayerState(state))
    }

    pub fn send_bomb_placed(&self, bomb: BombPlaced) -> bool {
        self.send(Message::BombPlaced(bomb))
    }

    pub fn send_object_destroyed(&self, x: i32, y: i32) -> bool {
        self.send(Message::ObjectDestroyed(ObjectDestroyed { x, y }))
    }

    pub fn send_powerup_spawned(&self, powerup: PowerupSpawned) -> bool {
        self.send(Message::PowerupSpawned(powerup))
    }

    pub fn send_powerup_collected(&self, powerup: PowerupCollected) -> bool {
        self.send(Message::PowerupCollected(powerup))
    }

    /// Announces the end of the match. Use [`disconnect`](Self::disconnect)
    /// to leave; it sends `GameOver { Disconnect }` itself.
    pub fn send_game_over(&self, reason: GameOverReason) -> bool {
        self.send(Message::game_over(reason))
    }

    fn send(&self, message: Message) -> bool {
        let kind = message.kind();
        match self.link.send_gameplay(message) {
            Ok(SendOutcome::Sent) => true,
            Ok(SendOutcome::Throttled) => {
                trace!(%kind, "throttled");
                true
            }
            Err(SessionError::NotEstablished) => false,
            Err(e) => {
                debug!(%kind, error = %e, "send failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Everything received since the last call, oldest first. Each message
    /// is returned exactly once.
    pub fn get_messages(&self) -> Vec<Inbound> {
        self.link.inbox().drain()
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Says goodbye, stops every background task, and closes the socket.
    ///
    /// Waits at most `shutdown_timeout` for the tasks. Safe to call more
    /// than once; also runs on drop.
    pub fn disconnect(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        if self.link.is_established() {
            if let Err(e) = self.link.send(Message::game_over(GameOverReason::Disconnect)) {
                debug!(error = %e, "farewell not queued");
            }
        }
        self.cancel.cancel();

        let driver = self.driver.take();
        let within = self.config.shutdown_timeout;
        if tokio::runtime::Handle::try_current().is_ok() {
            // Blocking inside another runtime would panic.
            runtime.shutdown_background();
        } else {
            if let Some(driver) = driver {
                let joined = runtime.block_on(async { tokio::time::timeout(within, driver).await });
                if joined.is_err() {
                    debug!(?within, "network tasks still winding down");
                }
            }
            runtime.shutdown_timeout(within);
        }

        self.link.mark_dead("local disconnect");
        self.link.set_phase(LinkPhase::Closed);
        info!(role = %self.role(), "network closed");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> LinkPhase {
        self.link.phase()
    }

    pub fn role(&self) -> PeerRole {
        self.link.role()
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.state().peer_addr
    }

    /// The port the host actually bound, after fallback.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// This side's player id, once established.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.link.state().player_id
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.link.stats().snapshot()
    }
}

impl Drop for GameNetwork {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for GameNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameNetwork")
            .field("role", &self.role())
            .field("phase", &self.phase())
            .field("local_port", &self.local_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastlink_protocol::{Facing, PowerupState};

    fn player_state() -> PlayerState {
        PlayerState {
            x: 1,
            y: 2,
            facing: Facing::Down,
            anim_frame: 0,
            life: 3,
            moving: false,
            powerup_state: PowerupState::default(),
        }
    }

    #[test]
    fn test_sends_refused_before_initialize() {
        let network = GameNetwork::new(NetworkConfig::host());
        assert!(!network.is_connected());
        assert!(!network.send_player_state(player_state()));
        assert!(!network.send_object_destroyed(3, 4));
        assert!(network.get_messages().is_empty());
        assert_eq!(network.phase(), LinkPhase::Idle);
    }

    #[test]
    fn test_disconnect_without_initialize_is_noop() {
        let mut network = GameNetwork::new(NetworkConfig::client("127.0.0.1"));
        network.disconnect();
        network.disconnect();
        assert_eq!(network.phase(), LinkPhase::Idle);
    }

    #[test]
    fn test_initialize_twice_is_refused() {
        let mut network = GameNetwork::new(NetworkConfig::host().with_port(0));
        assert!(network.initialize());
        assert!(matches!(
            network.start(),
            Err(BlastlinkError::AlreadyInitialized)
        ));
        network.disconnect();
        assert_eq!(network.phase(), LinkPhase::Closed);
    }
}
