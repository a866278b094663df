//! Codec trait and implementations for serializing message payloads.
//!
//! A codec turns a Rust value into the bytes that go *inside* a frame.
//! It knows nothing about length prefixes; that is the job of
//! [`FrameCodec`](crate::FrameCodec), which wraps any `Codec`.
//!
//! [`JsonCodec`] is the only implementation today. JSON is
//! self-describing, so a frame captured off the wire can be read by eye
//! when a LAN session misbehaves.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is cloned into the receive
/// loop and writer tasks, which may run on any runtime worker.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use blastlink_protocol::{Codec, Envelope, Heartbeat, JsonCodec, Message};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(Message::Heartbeat(Heartbeat { timestamp: 5000 }));
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Message, ObjectDestroyed};

    #[test]
    fn test_json_codec_round_trips_envelope() {
        let envelope = Envelope {
            sent_at: 42,
            message: Message::ObjectDestroyed(ObjectDestroyed { x: 64, y: 96 }),
        };
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let decoded: Envelope = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
