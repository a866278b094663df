//! Error types for the protocol layer.
//!
//! Each crate in blastlink defines its own error enum. A `ProtocolError`
//! always means the bytes were wrong (bad length, bad payload, unknown
//! message kind), never that the socket misbehaved.

/// Errors that can occur while encoding, framing, or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: a truncated payload, a missing field, or a field
    /// with the wrong type. The offending frame has already been
    /// consumed, so decoding can continue with the next one.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame header declared a payload larger than the configured
    /// maximum. Everything buffered is discarded so a corrupted stream
    /// cannot wedge the receiver waiting for a gigabyte that never comes.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The frame decoded as an envelope but named a message kind this
    /// build does not know.
    #[error("unknown message kind `{0}`")]
    UnknownKind(String),

    /// I/O failure surfaced through the framing layer.
    #[error("frame i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
