//! The message catalogue: every value that travels on the wire.
//!
//! The catalogue is closed. Both peers are built from the same source, so
//! a tag the receiver does not recognise is a protocol error rather than
//! something to skip silently.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, used for `sent_at` and payload
/// timestamps. Wall-clock, so only meaningful for logging and for the
/// game's own interpolation; liveness uses a monotonic clock instead.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one of the two players in a session.
///
/// The host is always player 1 and assigns 2 to the client in
/// [`ConnectionAccepted`]. Serialized as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The hosting player.
    pub const HOST: PlayerId = PlayerId(1);
    /// The joining player.
    pub const CLIENT: PlayerId = PlayerId(2);
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Which side of the session this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Host,
    Client,
}

impl PeerRole {
    /// The player id this role always plays as.
    pub fn player_id(self) -> PlayerId {
        match self {
            Self::Host => PlayerId::HOST,
            Self::Client => PlayerId::CLIENT,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Client => write!(f, "client"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload building blocks
// ---------------------------------------------------------------------------

/// Direction a player sprite is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

/// The kinds of power-up that can drop from a destroyed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupKind {
    /// One more bomb on the field at a time.
    ExtraBomb,
    /// Explosions reach one tile further.
    BlastRange,
    /// Faster movement.
    Speed,
    /// One extra life.
    ExtraLife,
}

/// A player's accumulated power-ups, carried in every [`PlayerState`] so
/// the remote side never has to replay the collect events to know them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupState {
    pub bomb_capacity: u8,
    pub blast_radius: u8,
    pub speed_level: u8,
}

impl Default for PowerupState {
    fn default() -> Self {
        Self {
            bomb_capacity: 1,
            blast_radius: 1,
            speed_level: 0,
        }
    }
}

/// Why a session (or a round) ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    /// The sender is leaving; the link is about to close.
    Disconnect,
    /// A player ran out of lives.
    PlayerDefeated { loser: PlayerId },
    /// The host already has a peer and refuses this one.
    SessionFull,
    Other(String),
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => write!(f, "disconnect"),
            Self::PlayerDefeated { loser } => write!(f, "{loser} defeated"),
            Self::SessionFull => write!(f, "session full"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads, one per message kind
// ---------------------------------------------------------------------------

/// Client → host: "let me join".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub role: PeerRole,
    pub timestamp: u64,
}

/// Host → client: the handshake is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAccepted {
    pub assigned_player_id: PlayerId,
    pub timestamp: u64,
}

/// High-frequency snapshot of the sender's own player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    pub anim_frame: u32,
    pub life: u8,
    pub moving: bool,
    #[serde(default)]
    pub powerup_state: PowerupState,
}

/// A bomb dropped by `owner_id`. Receivers dedupe on `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombPlaced {
    pub x: i32,
    pub y: i32,
    pub owner_id: PlayerId,
    pub placed_at: u64,
    pub blast_radius: u8,
}

/// A destructible block at `(x, y)` is gone. Applying it twice is a
/// no-op because destruction is a one-way flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDestroyed {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupSpawned {
    pub x: i32,
    pub y: i32,
    pub kind: PowerupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupCollected {
    pub x: i32,
    pub y: i32,
    pub kind: PowerupKind,
    pub collector_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOver {
    pub reason: GameOverReason,
    pub timestamp: u64,
}

/// Liveness only. Any frame counts as liveness; this one exists so an
/// idle player still produces traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: u64,
}

/// Active liveness probe. The host echoes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Message and MessageKind
// ---------------------------------------------------------------------------

/// Every message the two peers exchange.
///
/// Adjacently tagged, so a bomb looks like
/// `{"kind": "BOMB_PLACED", "payload": {"x": 120, ...}}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    ConnectionRequest(ConnectionRequest),
    ConnectionAccepted(ConnectionAccepted),
    PlayerState(PlayerState),
    BombPlaced(BombPlaced),
    ObjectDestroyed(ObjectDestroyed),
    PowerupSpawned(PowerupSpawned),
    PowerupCollected(PowerupCollected),
    GameOver(GameOver),
    Heartbeat(Heartbeat),
    ConnectionCheck(ConnectionCheck),
}

impl Message {
    /// The payload-free tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ConnectionRequest(_) => MessageKind::ConnectionRequest,
            Self::ConnectionAccepted(_) => MessageKind::ConnectionAccepted,
            Self::PlayerState(_) => MessageKind::PlayerState,
            Self::BombPlaced(_) => MessageKind::BombPlaced,
            Self::ObjectDestroyed(_) => MessageKind::ObjectDestroyed,
            Self::PowerupSpawned(_) => MessageKind::PowerupSpawned,
            Self::PowerupCollected(_) => MessageKind::PowerupCollected,
            Self::GameOver(_) => MessageKind::GameOver,
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::ConnectionCheck(_) => MessageKind::ConnectionCheck,
        }
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat(Heartbeat {
            timestamp: now_millis(),
        })
    }

    pub fn connection_check() -> Self {
        Self::ConnectionCheck(ConnectionCheck {
            timestamp: now_millis(),
        })
    }

    pub fn game_over(reason: GameOverReason) -> Self {
        Self::GameOver(GameOver {
            reason,
            timestamp: now_millis(),
        })
    }
}

/// The tag of a [`Message`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ConnectionRequest,
    ConnectionAccepted,
    PlayerState,
    BombPlaced,
    ObjectDestroyed,
    PowerupSpawned,
    PowerupCollected,
    GameOver,
    Heartbeat,
    ConnectionCheck,
}

impl MessageKind {
    /// Every kind, in catalogue order.
    pub const ALL: [MessageKind; 10] = [
        Self::ConnectionRequest,
        Self::ConnectionAccepted,
        Self::PlayerState,
        Self::BombPlaced,
        Self::ObjectDestroyed,
        Self::PowerupSpawned,
        Self::PowerupCollected,
        Self::GameOver,
        Self::Heartbeat,
        Self::ConnectionCheck,
    ];

    /// The tag as written on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRequest => "CONNECTION_REQUEST",
            Self::ConnectionAccepted => "CONNECTION_ACCEPTED",
            Self::PlayerState => "PLAYER_STATE",
            Self::BombPlaced => "BOMB_PLACED",
            Self::ObjectDestroyed => "OBJECT_DESTROYED",
            Self::PowerupSpawned => "POWERUP_SPAWNED",
            Self::PowerupCollected => "POWERUP_COLLECTED",
            Self::GameOver => "GAME_OVER",
            Self::Heartbeat => "HEARTBEAT",
            Self::ConnectionCheck => "CONNECTION_CHECK",
        }
    }

    /// Kinds sent every frame by the game loop and therefore throttled.
    pub fn is_high_frequency(self) -> bool {
        matches!(self, Self::PlayerState)
    }

    /// Kinds the network layer produces on its own.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Self::ConnectionRequest
                | Self::ConnectionAccepted
                | Self::Heartbeat
                | Self::ConnectionCheck
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| tag.to_string())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire value: one message plus the time it was sent.
///
/// Exactly one envelope travels in each frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender wall-clock, milliseconds since the Unix epoch.
    pub sent_at: u64,
    pub message: Message,
}

impl Envelope {
    /// Wraps `message`, stamping it with the current time.
    pub fn new(message: Message) -> Self {
        Self {
            sent_at: now_millis(),
            message,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}

// =========================================================================
// Tests
// =========================================================================
