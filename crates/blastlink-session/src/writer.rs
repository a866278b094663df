//! The writer task: outbound queue in, framed bytes out.

use blastlink_protocol::{Codec, Envelope, FrameCodec, MessageKind, ProtocolError};
use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::link::Link;

/// Writes queued envelopes until the queue closes, `cancel` fires, or
/// the socket fails.
///
/// The queue is polled before the token, so frames queued ahead of a
/// cancel (the farewell `GameOver` in particular) still go out. On the
/// way out the write half is flushed and shut down.
///
/// A write error marks the link degraded and stops the task. It does not
/// mark the link dead: the receive loop and the heartbeat monitor own
/// that decision.
pub async fn run_writer<W, C>(
    writer: W,
    mut outbound: mpsc::Receiver<Envelope>,
    link: Link,
    codec: FrameCodec<C>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
    C: Codec,
{
    let mut sink = FramedWrite::new(writer, codec);

    loop {
        let envelope = tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let kind = envelope.kind();
        match sink.send(envelope).await {
            Ok(()) => {
                link.stats().record_sent();
                if kind == MessageKind::Heartbeat {
                    link.stats().record_heartbeat();
                }
            }
            Err(ProtocolError::Io(e)) => {
                warn!(error = %e, %kind, "write failed");
                link.stats().record_connection_error();
                link.mark_degraded();
                return;
            }
            Err(e) => {
                // Nothing reached the socket; the stream is still in sync.
                warn!(error = %e, %kind, "dropping unencodable frame");
                link.stats().record_protocol_error();
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "closing write half");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use blastlink_protocol::{GameOverReason, Message, PeerRole, PlayerId};
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_util::codec::FramedRead;

    fn established(config: SessionConfig) -> (Link, mpsc::Receiver<Envelope>) {
        let link = Link::new(PeerRole::Host, config);
        let rx = link.attach();
        link.mark_connected("127.0.0.1:1".parse().unwrap());
        link.mark_established(PlayerId::HOST);
        (link, rx)
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (link, rx) = established(SessionConfig::default());
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_writer(local, rx, link.clone(), FrameCodec::new(), cancel.clone()));

        link.send(Message::heartbeat()).unwrap();
        link.send(Message::connection_check()).unwrap();

        let mut frames = FramedRead::new(remote, FrameCodec::new());
        let first = frames.next().await.unwrap().unwrap();
        let second = frames.next().await.unwrap().unwrap();
        assert_eq!(first.kind(), MessageKind::Heartbeat);
        assert_eq!(second.kind(), MessageKind::ConnectionCheck);

        cancel.cancel();
        handle.await.unwrap();
        let stats = link.stats().snapshot();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.heartbeats_sent, 1);
    }

    #[tokio::test]
    async fn test_queued_farewell_flushed_before_cancel() {
        let (link, rx) = established(SessionConfig::default());
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let cancel = CancellationToken::new();

        link.send(Message::game_over(GameOverReason::Disconnect)).unwrap();
        cancel.cancel();
        run_writer(local, rx, link.clone(), FrameCodec::new(), cancel).await;

        let mut frames = FramedRead::new(remote, FrameCodec::new());
        let farewell = frames.next().await.unwrap().unwrap();
        assert_eq!(farewell.kind(), MessageKind::GameOver);
        // Write half was shut down.
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_marks_degraded_not_dead() {
        let (link, rx) = established(SessionConfig::default());
        let (local, remote) = tokio::io::duplex(64);
        drop(remote);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_writer(local, rx, link.clone(), FrameCodec::new(), cancel));

        link.send(Message::heartbeat()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("writer should stop")
            .unwrap();

        let state = link.state();
        assert!(state.degraded);
        assert!(state.connected);
        assert_eq!(link.stats().snapshot().connection_errors, 1);
    }

    #[tokio::test]
    async fn test_oversized_frame_dropped_and_writer_continues() {
        let (link, rx) = established(SessionConfig::default());
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let cancel = CancellationToken::new();
        let codec = FrameCodec::new().with_max_frame_len(200);
        let handle = tokio::spawn(run_writer(local, rx, link.clone(), codec, cancel.clone()));

        link.send(Message::game_over(GameOverReason::Other("x".repeat(400))))
            .unwrap();
        link.send(Message::heartbeat()).unwrap();

        let mut frames = FramedRead::new(remote, FrameCodec::new());
        let next = frames.next().await.unwrap().unwrap();
        assert_eq!(next.kind(), MessageKind::Heartbeat);
        assert_eq!(link.stats().snapshot().protocol_errors, 1);
        assert!(!link.state().degraded);

        cancel.cancel();
        handle.await.unwrap();
    }
}
