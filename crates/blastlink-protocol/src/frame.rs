//! Length-prefixed framing over a byte stream.
//!
//! TCP delivers a stream, not messages, so each envelope is preceded by
//! its length:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ len: u32 BE  │ payload: `len` codec bytes   │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! [`FrameCodec`] plugs into `tokio_util::codec` as both `Decoder` and
//! `Encoder`. The decoder is also usable on its own: feed socket bytes into
//! a `BytesMut` and call [`Decoder::decode`] until it returns `Ok(None)`.

use bytes::{Buf, BufMut, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, Encoder};

#[cfg(feature = "json")]
use crate::JsonCodec;
use crate::{Codec, Envelope, MessageKind, ProtocolError};

/// Size of the big-endian length header.
pub const HEADER_LEN: usize = 4;

/// Largest payload accepted unless configured otherwise (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Just enough of an envelope to read its tag after a failed decode.
#[derive(Deserialize)]
struct KindProbe {
    message: KindTag,
}

#[derive(Deserialize)]
struct KindTag {
    kind: String,
}

/// Frames [`Envelope`]s with a 4-byte big-endian length prefix.
#[derive(Debug, Clone)]
pub struct FrameCodec<C> {
    codec: C,
    max_frame_len: usize,
}

#[cfg(feature = "json")]
impl FrameCodec<JsonCodec> {
    /// A JSON frame codec with the default 1 MiB limit.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

#[cfg(feature = "json")]
impl Default for FrameCodec<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> FrameCodec<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Overrides the largest payload this codec will accept or produce.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Encodes one envelope into a complete frame (header + payload).
    ///
    /// # Errors
    /// `ProtocolError::Encode` if serialization fails, or
    /// `ProtocolError::FrameTooLarge` if the payload exceeds the limit.
    pub fn encode_frame(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let payload = self.encode_payload(envelope)?;
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn encode_payload(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let payload = self.codec.encode(envelope)?;
        if payload.len() > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        }
        Ok(payload)
    }

    /// Decodes one payload, distinguishing an unknown tag from other
    /// malformed input.
    fn decode_payload(&self, payload: &[u8]) -> Result<Envelope, ProtocolError> {
        self.codec.decode::<Envelope>(payload).map_err(|err| {
            match self.codec.decode::<KindProbe>(payload) {
                Ok(probe) if probe.message.kind.parse::<MessageKind>().is_err() => {
                    ProtocolError::UnknownKind(probe.message.kind)
                }
                _ => err,
            }
        })
    }
}

impl<C: Codec> Decoder for FrameCodec<C> {
    type Item = Envelope;
    type Error = ProtocolError;

    /// Extracts one envelope from the front of `src`.
    ///
    /// - `Ok(None)`: not enough bytes yet; `src` is left untouched.
    /// - `Ok(Some(_))`: one frame was consumed; the remainder stays in `src`.
    /// - `Err(_)`: the offending bytes were consumed. A bad payload costs
    ///   its own frame and the next call resumes on whatever follows. An
    ///   oversized length clears the whole buffer, since nothing after a
    ///   bogus header can be trusted to start on a frame boundary.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, ProtocolError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&src[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_len {
            src.clear();
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let frame_len = HEADER_LEN + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len);
        self.decode_payload(&payload).map(Some)
    }
}

impl<C: Codec> Encoder<Envelope> for FrameCodec<C> {
    type Error = ProtocolError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = self.encode_payload(&item)?;
        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{BombPlaced, Message, ObjectDestroyed, PlayerId};

    fn bomb() -> Envelope {
        Envelope {
            sent_at: 1_000,
            message: Message::BombPlaced(BombPlaced {
                x: 120,
                y: 180,
                owner_id: PlayerId(2),
                placed_at: 999,
                blast_radius: 1,
            }),
        }
    }

    #[test]
    fn test_header_is_big_endian_payload_length() {
        let codec = FrameCodec::new();
        let frame = codec.encode_frame(&bomb()).unwrap();

        let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(declared as usize, frame.len() - HEADER_LEN);
    }

    #[test]
    fn test_encoder_matches_encode_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(bomb(), &mut buf).unwrap();
        assert_eq!(&buf[..], &codec.encode_frame(&bomb()).unwrap()[..]);
    }

    #[test]
    fn test_decode_needs_full_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0, 1][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3, "partial header must stay buffered");
    }

    #[test]
    fn test_decode_leaves_remainder_in_buffer() {
        let mut codec = FrameCodec::new();
        let first = codec.encode_frame(&bomb()).unwrap();
        let second = Envelope {
            sent_at: 2_000,
            message: Message::ObjectDestroyed(ObjectDestroyed { x: 1, y: 2 }),
        };
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&codec.encode_frame(&second).unwrap()[..7]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(bomb()));
        assert_eq!(buf.len(), 7);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_rejects_payload_over_limit() {
        let codec = FrameCodec::new().with_max_frame_len(8);
        let result = codec.encode_frame(&bomb());
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn test_decode_reports_unknown_kind() {
        let mut codec = FrameCodec::new();
        let payload = br#"{"sent_at":1,"message":{"kind":"BOMB_EXPLODED","payload":{}}}"#;
        let mut buf = BytesMut::new();
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(payload);

        match codec.decode(&mut buf) {
            Err(ProtocolError::UnknownKind(kind)) => assert_eq!(kind, "BOMB_EXPLODED"),
            other => panic!("expected UnknownKind, got {other:?}"),
        }
        assert!(buf.is_empty(), "bad frame must be consumed");
    }

    #[test]
    fn test_decode_known_kind_with_bad_payload_is_decode_error() {
        let mut codec = FrameCodec::new();
        let payload = br#"{"sent_at":1,"message":{"kind":"BOMB_PLACED","payload":{"x":"left"}}}"#;
        let mut buf = BytesMut::new();
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(payload);

        assert!(matches!(codec.decode(&mut buf), Err(ProtocolError::Decode(_))));
    }
}
