//! Unified error type for blastlink.

use std::time::Duration;

use blastlink_protocol::{GameOverReason, ProtocolError};
use blastlink_session::SessionError;
use blastlink_transport::TransportError;

/// Top-level error that wraps the layer errors plus the failures only the
/// connection establisher can report.
///
/// The facade itself reports plain booleans to the game loop; this type
/// is what gets logged, and what [`GameNetwork::start`](crate::GameNetwork::start)
/// returns to callers that want the reason.
#[derive(Debug, thiserror::Error)]
pub enum BlastlinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The host never answered the connection request.
    #[error("no handshake answer within {0:?}")]
    HandshakeTimeout(Duration),

    /// The socket closed while the handshake was in flight.
    #[error("connection lost during handshake")]
    HandshakeAborted,

    /// The host turned us away.
    #[error("host refused the connection: {0}")]
    Rejected(GameOverReason),

    /// Every dial attempt failed.
    #[error("gave up after {0} attempts")]
    AttemptsExhausted(u32),

    #[error("network already initialized")]
    AlreadyInitialized,

    /// The background runtime could not be started.
    #[error("failed to start network runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl BlastlinkError {
    /// Whether another dial attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::HandshakeTimeout(_) | Self::HandshakeAborted => true,
            Self::Session(SessionError::OutboundClosed | SessionError::OutboundFull) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectTimedOut {
            addr: "10.0.0.7:4040".into(),
            timeout: Duration::from_secs(5),
        };
        let wrapped: BlastlinkError = err.into();
        assert!(matches!(wrapped, BlastlinkError::Transport(_)));
        assert!(wrapped.to_string().contains("10.0.0.7:4040"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownKind("BOMB_EXPLODED".into());
        let wrapped: BlastlinkError = err.into();
        assert!(matches!(wrapped, BlastlinkError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let wrapped: BlastlinkError = SessionError::NotEstablished.into();
        assert!(matches!(wrapped, BlastlinkError::Session(_)));
    }

    #[test]
    fn test_rejection_is_terminal() {
        assert!(!BlastlinkError::Rejected(GameOverReason::SessionFull).is_retryable());
        assert!(BlastlinkError::HandshakeTimeout(Duration::from_secs(5)).is_retryable());
        assert!(!BlastlinkError::AttemptsExhausted(5).is_retryable());
    }
}
