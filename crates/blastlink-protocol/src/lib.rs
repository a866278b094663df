//! Wire protocol for blastlink.
//!
//! This crate defines what two peers say to each other and how it looks
//! on the stream:
//!
//! - **Types** ([`Envelope`], [`Message`], [`MessageKind`], payload
//!   structs): the closed message catalogue.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how one envelope becomes
//!   bytes.
//! - **Framing** ([`FrameCodec`]): the 4-byte big-endian length prefix that
//!   delimits envelopes on a TCP stream.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or liveness:
//!
//! ```text
//! Transport (TcpStream) → Protocol (Envelope) → Session (inbox, heartbeats)
//! ```

mod codec;
mod error;
mod frame;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use frame::{DEFAULT_MAX_FRAME_LEN, FrameCodec, HEADER_LEN};
pub use types::{
    BombPlaced, ConnectionAccepted, ConnectionCheck, ConnectionRequest, Envelope, Facing,
    GameOver, GameOverReason, Heartbeat, Message, MessageKind, ObjectDestroyed, PeerRole,
    PlayerId, PlayerState, PowerupCollected, PowerupKind, PowerupSpawned, PowerupState,
    now_millis,
};
