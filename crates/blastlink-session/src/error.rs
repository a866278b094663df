//! Error types for the session layer.

/// Errors returned when handing a message to the connection.
///
/// None of these are fatal by themselves: the caller (usually the facade)
/// reports `false` to the game loop and the liveness machinery decides
/// whether the peer is gone.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Gameplay traffic was offered before the handshake finished.
    #[error("connection not established")]
    NotEstablished,

    /// There is no live connection to write to.
    #[error("no connection attached")]
    NotAttached,

    /// The writer is not keeping up; the frame was dropped.
    #[error("outbound queue full")]
    OutboundFull,

    /// The writer task has exited, usually after a write error.
    #[error("outbound queue closed")]
    OutboundClosed,
}
