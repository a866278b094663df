//! Configuration for a [`GameNetwork`](crate::GameNetwork).

use std::time::Duration;

use blastlink_protocol::{DEFAULT_MAX_FRAME_LEN, PeerRole};
use blastlink_session::SessionConfig;
use blastlink_transport::RetryPolicy;
use serde::{Deserialize, Serialize};

/// The default game port.
pub const DEFAULT_PORT: u16 = 4040;

/// Which side of the match this process plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Listen and wait for one friend.
    Host,
    /// Dial the host at `host_ip`.
    Client { host_ip: String },
}

impl Role {
    pub fn peer_role(&self) -> PeerRole {
        match self {
            Self::Host => PeerRole::Host,
            Self::Client { .. } => PeerRole::Client,
        }
    }
}

/// Everything a [`GameNetwork`](crate::GameNetwork) needs to know.
///
/// Built in code, typically from the game's own settings screen:
///
/// ```rust
/// use std::time::Duration;
/// use blastlink::NetworkConfig;
///
/// let config = NetworkConfig::client("192.168.1.20")
///     .with_port(5050)
///     .with_handshake_timeout(Duration::from_secs(3));
/// assert_eq!(config.port, 5050);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub role: Role,

    /// Port the host listens on and the client dials.
    pub port: u16,

    /// How many ports after `port` the host tries when it is busy. The
    /// client must be told the port the host ended up on.
    pub port_fallback_attempts: u16,

    /// How long the host waits for a friend before giving up.
    pub accept_timeout: Duration,

    /// How long the client waits for `ConnectionAccepted` after dialing.
    pub handshake_timeout: Duration,

    /// Client dial attempts and pacing.
    pub retry: RetryPolicy,

    /// Redial after the link drops without a farewell. Client only.
    pub auto_reconnect: bool,

    /// Largest frame payload accepted or produced.
    pub max_frame_len: usize,

    /// How long `disconnect` waits for background tasks to wind down.
    pub shutdown_timeout: Duration,

    pub session: SessionConfig,
}

impl NetworkConfig {
    fn with_role(role: Role) -> Self {
        Self {
            role,
            port: DEFAULT_PORT,
            port_fallback_attempts: 10,
            accept_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            auto_reconnect: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            shutdown_timeout: Duration::from_millis(500),
            session: SessionConfig::default(),
        }
    }

    pub fn host() -> Self {
        Self::with_role(Role::Host)
    }

    pub fn client(host_ip: impl Into<String>) -> Self {
        Self::with_role(Role::Client {
            host_ip: host_ip.into(),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_port_fallback_attempts(mut self, attempts: u16) -> Self {
        self.port_fallback_attempts = attempts;
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Shorthand for the two heartbeat knobs most games tune.
    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.session.heartbeat_interval = interval;
        self.session.heartbeat_timeout = timeout;
        self
    }

    pub fn with_player_state_interval(mut self, interval: Duration) -> Self {
        self.session.player_state_interval = interval;
        self
    }

    pub fn peer_role(&self) -> PeerRole {
        self.role.peer_role()
    }
}
