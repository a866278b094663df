//! Stream-level framing properties: fragmented reads, oversized headers,
//! and corrupt frames in the middle of a healthy stream.
//!
//! These tests drive `FrameCodec` the way the receive loop does: bytes
//! arrive in arbitrary chunks, get appended to a `BytesMut`, and the
//! decoder is called until it asks for more data.

use blastlink_protocol::{
    BombPlaced, Envelope, Facing, FrameCodec, GameOverReason, Message, PlayerId, PlayerState,
    PowerupCollected, PowerupKind, PowerupState, ProtocolError,
};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Decoder;

// =========================================================================
// Helpers
// =========================================================================

fn player_state() -> Envelope {
    Envelope {
        sent_at: 1_700_000_000_000,
        message: Message::PlayerState(PlayerState {
            x: 48,
            y: 96,
            facing: Facing::Right,
            anim_frame: 2,
            life: 3,
            moving: true,
            powerup_state: PowerupState {
                bomb_capacity: 2,
                blast_radius: 3,
                speed_level: 1,
            },
        }),
    }
}

fn bomb() -> Envelope {
    Envelope {
        sent_at: 1_700_000_000_050,
        message: Message::BombPlaced(BombPlaced {
            x: 120,
            y: 180,
            owner_id: PlayerId(2),
            placed_at: 1_700_000_000_049,
            blast_radius: 1,
        }),
    }
}

/// Decodes everything currently decodable, collecting errors separately.
fn drain(
    codec: &mut FrameCodec<blastlink_protocol::JsonCodec>,
    buf: &mut BytesMut,
) -> (Vec<Envelope>, Vec<ProtocolError>) {
    let mut decoded = Vec::new();
    let mut errors = Vec::new();
    loop {
        match codec.decode(buf) {
            Ok(Some(envelope)) => decoded.push(envelope),
            Ok(None) => break,
            Err(e) => errors.push(e),
        }
    }
    (decoded, errors)
}

// =========================================================================
// Round trip
// =========================================================================

#[test]
fn test_round_trip_representative_messages() {
    let mut codec = FrameCodec::new();
    let samples = vec![
        player_state(),
        bomb(),
        Envelope::new(Message::PowerupCollected(PowerupCollected {
            x: 32,
            y: 32,
            kind: PowerupKind::BlastRange,
            collector_id: PlayerId(1),
        })),
        Envelope::new(Message::game_over(GameOverReason::Other("time up".into()))),
    ];

    for envelope in samples {
        let mut buf = BytesMut::from(&codec.encode_frame(&envelope).unwrap()[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(envelope));
        assert!(buf.is_empty());
    }
}

// =========================================================================
// Fragmentation
// =========================================================================

#[test]
fn test_split_at_every_boundary_yields_message_once() {
    let mut codec = FrameCodec::new();
    let frame = codec.encode_frame(&player_state()).unwrap();

    for split in 0..=frame.len() {
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();

        buf.extend_from_slice(&frame[..split]);
        let (first, errors) = drain(&mut codec, &mut buf);
        assert!(errors.is_empty(), "split {split}: {errors:?}");
        decoded.extend(first);

        buf.extend_from_slice(&frame[split..]);
        let (second, errors) = drain(&mut codec, &mut buf);
        assert!(errors.is_empty(), "split {split}: {errors:?}");
        decoded.extend(second);

        assert_eq!(decoded, vec![player_state()], "split at byte {split}");
        assert!(buf.is_empty());
    }
}

#[test]
fn test_byte_by_byte_stream_of_two_frames() {
    let mut codec = FrameCodec::new();
    let mut stream = codec.encode_frame(&player_state()).unwrap();
    stream.extend(codec.encode_frame(&bomb()).unwrap());

    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();
    for byte in stream {
        buf.put_u8(byte);
        decoded.extend(drain(&mut codec, &mut buf).0);
    }

    assert_eq!(decoded, vec![player_state(), bomb()]);
}

// =========================================================================
// Malformed input
// =========================================================================

#[test]
fn test_oversized_header_resets_buffer() {
    let mut codec = FrameCodec::new().with_max_frame_len(1024);
    let mut buf = BytesMut::new();
    buf.put_u32(4096);
    // The body of the oversized frame, which must not be parsed as headers.
    buf.extend_from_slice(&[0x41; 64]);

    let (decoded, errors) = drain(&mut codec, &mut buf);

    assert!(decoded.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        ProtocolError::FrameTooLarge { len: 4096, max: 1024 }
    ));
    assert!(buf.is_empty());

    // The next frame to arrive decodes normally.
    buf.extend_from_slice(&codec.encode_frame(&bomb()).unwrap());
    let (decoded, errors) = drain(&mut codec, &mut buf);
    assert_eq!(decoded, vec![bomb()]);
    assert!(errors.is_empty());
}

#[test]
fn test_oversized_header_does_not_wait_for_payload() {
    // A header claiming 2 MiB must fail immediately rather than asking
    // for more data.
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    buf.put_u32(2 * 1024 * 1024);

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::FrameTooLarge { .. })
    ));
    assert!(buf.is_empty());
}

#[test]
fn test_corrupt_frame_between_valid_frames_is_skipped() {
    let mut codec = FrameCodec::new();
    let garbage = b"\x00not an envelope";

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&codec.encode_frame(&player_state()).unwrap());
    buf.put_u32(garbage.len() as u32);
    buf.extend_from_slice(garbage);
    buf.extend_from_slice(&codec.encode_frame(&bomb()).unwrap());

    let (decoded, errors) = drain(&mut codec, &mut buf);

    assert_eq!(decoded, vec![player_state(), bomb()]);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ProtocolError::Decode(_)));
}
