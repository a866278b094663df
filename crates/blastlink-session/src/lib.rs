//! Per-connection machinery for blastlink.
//!
//! Everything that happens between "a socket is open" and "the socket is
//! gone" lives here:
//!
//! - [`Link`]: the shared handle. Liveness flags, the inbox, the outbound
//!   queue, the player-state throttle, traffic counters.
//! - [`run_receive_loop`]: decodes frames into the inbox and applies the
//!   control messages that change link state.
//! - [`run_writer`]: drains the outbound queue onto the socket.
//! - [`run_heartbeat_monitor`]: sends heartbeats, probes a quiet peer,
//!   and declares a silent one dead.
//! - [`ConnectionTasks`]: spawns the three tasks above for one socket and
//!   shuts them down together.
//!
//! Dialing, accepting and the handshake sequence live one layer up, in
//! the `blastlink` crate.

mod config;
mod connection;
mod error;
mod heartbeat;
mod inbox;
mod link;
mod receiver;
mod state;
mod stats;
mod throttle;
mod writer;

pub use config::SessionConfig;
pub use connection::ConnectionTasks;
pub use error::SessionError;
pub use heartbeat::run_heartbeat_monitor;
pub use inbox::{Inbound, Inbox};
pub use link::{Link, SendOutcome};
pub use receiver::run_receive_loop;
pub use state::{LinkPhase, LinkState};
pub use stats::{NetworkStats, StatsSnapshot};
pub use throttle::Throttle;
pub use writer::run_writer;
