//! # Blastlink
//!
//! Real-time state sync for a two-player LAN game over one TCP
//! connection.
//!
//! One player hosts, the other joins by IP. After a short handshake both
//! sides stream their own player state at up to 20 Hz, send discrete
//! events (bombs, destroyed blocks, power-ups, game over) as they happen,
//! and keep the link honest with heartbeats.
//!
//! The crate is layered the same way the traffic flows:
//!
//! - `blastlink-transport`: TCP bind with port fallback, accept, dial
//!   with retry.
//! - `blastlink-protocol`: the closed message catalogue and the
//!   length-prefixed JSON frame codec.
//! - `blastlink-session`: per-connection tasks, liveness, inbox,
//!   throttling.
//! - this crate: the handshake, reconnects, and the synchronous
//!   [`GameNetwork`] facade.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blastlink::prelude::*;
//!
//! // On the joining machine:
//! let mut network = GameNetwork::new(NetworkConfig::client("192.168.1.20"));
//! network.initialize();
//!
//! // Every frame:
//! for inbound in network.get_messages() {
//!     if let Message::BombPlaced(bomb) = inbound.envelope.message {
//!         println!("bomb at {},{}", bomb.x, bomb.y);
//!     }
//! }
//! ```

mod config;
mod error;
mod establish;
mod network;

pub use config::{DEFAULT_PORT, NetworkConfig, Role};
pub use error::BlastlinkError;
pub use network::GameNetwork;

pub use blastlink_protocol as protocol;
pub use blastlink_session as session;
pub use blastlink_transport as transport;

/// Installs a `tracing` subscriber that prints to stderr.
///
/// `default_filter` (e.g. `"info"` or `"blastlink=debug"`) applies unless
/// `RUST_LOG` is set. Returns `false` if a subscriber was already
/// installed. Games with their own logging setup should skip this.
pub fn init_tracing(default_filter: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

/// Everything a game needs in one import.
pub mod prelude {
    pub use crate::{BlastlinkError, GameNetwork, NetworkConfig, Role};
    pub use blastlink_protocol::{
        BombPlaced, Envelope, Facing, GameOverReason, Message, MessageKind, ObjectDestroyed,
        PlayerId, PlayerState, PowerupCollected, PowerupKind, PowerupSpawned, PowerupState,
    };
    pub use blastlink_session::{Inbound, LinkPhase, SessionConfig, StatsSnapshot};
    pub use blastlink_transport::RetryPolicy;
}
