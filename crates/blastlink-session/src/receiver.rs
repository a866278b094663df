//! The receive loop: socket bytes in, inbox entries out.
//!
//! One loop runs per socket. It reads with a short timeout so it can
//! notice cancellation promptly, feeds whatever arrived through the
//! [`FrameCodec`] decoder, and handles the few control messages that
//! change link state before queuing every message for the game.
//!
//! Undecodable frames are skipped. The decoder consumes the whole frame
//! before reporting the error, so one bad frame never desynchronizes the
//! stream. Only a run of `max_protocol_errors` bad frames in a row drops
//! the connection.

use std::net::SocketAddr;

use blastlink_protocol::{Codec, Envelope, FrameCodec, GameOverReason, Message, PeerRole};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::inbox::Inbound;
use crate::link::Link;

const READ_CHUNK: usize = 8 * 1024;

/// Runs until the peer closes the socket, a read fails, too many bad
/// frames arrive in a row, or `cancel` fires.
///
/// Every exit except cancellation marks the link dead. On cancellation
/// the flags are left to whoever cancelled.
pub async fn run_receive_loop<R, C>(
    mut reader: R,
    link: Link,
    mut codec: FrameCodec<C>,
    cancel: CancellationToken,
    from: Option<SocketAddr>,
) where
    R: AsyncRead + Unpin,
    C: Codec,
{
    let read_timeout = link.config().read_timeout;
    let max_errors = link.config().max_protocol_errors;
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut consecutive_errors = 0u32;

    let reason = 'session: loop {
        if cancel.is_cancelled() {
            debug!("receive loop cancelled");
            return;
        }

        // read_buf reports 0 on a full buffer, which would look like EOF.
        buf.reserve(READ_CHUNK);
        match tokio::time::timeout(read_timeout, reader.read_buf(&mut buf)).await {
            Err(_) => continue,
            Ok(Ok(0)) => break 'session "peer closed the connection",
            Ok(Ok(n)) => link.stats().record_bytes(n),
            Ok(Err(e)) => {
                if cancel.is_cancelled() {
                    return;
                }
                warn!(error = %e, "read failed");
                link.stats().record_connection_error();
                break 'session "read failed";
            }
        }

        loop {
            match codec.decode(&mut buf) {
                Ok(Some(envelope)) => {
                    consecutive_errors = 0;
                    handle_envelope(&link, envelope, from);
                }
                Ok(None) => break,
                Err(e) => {
                    consecutive_errors += 1;
                    link.stats().record_protocol_error();
                    warn!(error = %e, consecutive_errors, "dropping bad frame");
                    if consecutive_errors >= max_errors {
                        break 'session "too many bad frames";
                    }
                }
            }
        }
    };

    link.mark_dead(reason);
}

/// Applies link-level side effects of `envelope`, then queues it.
fn handle_envelope(link: &Link, envelope: Envelope, from: Option<SocketAddr>) {
    link.touch();
    link.stats().record_received();
    trace!(kind = %envelope.kind(), "frame received");

    match &envelope.message {
        Message::ConnectionAccepted(accepted) if link.role() == PeerRole::Client => {
            if link.mark_established(accepted.assigned_player_id) {
                debug!(player = %accepted.assigned_player_id, "handshake accepted");
            }
        }
        Message::ConnectionCheck(_) if link.role() == PeerRole::Host => {
            if let Err(e) = link.send(Message::connection_check()) {
                debug!(error = %e, "could not answer connection check");
            }
        }
        Message::GameOver(over)
            if matches!(
                over.reason,
                GameOverReason::Disconnect | GameOverReason::SessionFull
            ) =>
        {
            debug!(reason = %over.reason, "peer is leaving");
            link.mark_farewell(over.reason.clone());
        }
        _ => {}
    }

    link.inbox().push(Inbound { envelope, from });
}
