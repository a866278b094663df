//! Getting two peers talking: the host accept path and the client dial
//! path.
//!
//! Both paths end the same way: a socket handed to
//! [`ConnectionTasks::spawn`], a handshake, and then a wait until the link
//! is lost or the session is cancelled.
//!
//! ```text
//!   host                                  client
//!   ────                                  ──────
//!   bind, accept ◄──────── TCP ─────────── dial
//!   spawn tasks                           spawn tasks
//!                ◄── CONNECTION_REQUEST ── send
//!   send ────────── CONNECTION_ACCEPTED ─► receive loop marks established
//!   established                           wait_for(established) returns
//! ```
//!
//! The host serves exactly one peer. Anyone who dials afterwards gets a
//! `GameOver { SessionFull }` frame and a closed socket.

use std::time::Duration;

use blastlink_protocol::{
    ConnectionAccepted, ConnectionRequest, Envelope, FrameCodec, GameOverReason, JsonCodec,
    Message, PeerRole, PlayerId, now_millis,
};
use blastlink_session::{ConnectionTasks, Link, LinkPhase, LinkState};
use blastlink_transport::{HostListener, PeerStream, TransportError, dial};
use tokio::io::{AsyncWriteExt, sink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NetworkConfig;
use crate::error::BlastlinkError;

/// How long turning away an extra peer may take.
const TURN_AWAY_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) fn frame_codec(config: &NetworkConfig) -> FrameCodec<JsonCodec> {
    FrameCodec::new().with_max_frame_len(config.max_frame_len)
}

fn start_connection(
    link: &Link,
    stream: PeerStream,
    config: &NetworkConfig,
    cancel: CancellationToken,
) -> ConnectionTasks {
    let peer = stream.peer_addr();
    let (reader, writer) = stream.into_split();
    ConnectionTasks::spawn(link, reader, writer, frame_codec(config), cancel, peer)
}

/// The socket is gone, writes are failing, or the peer said goodbye.
fn session_over(state: &LinkState) -> bool {
    state.is_lost() || state.farewell.is_some()
}

/// Resolves once the session is over or `cancel` fires. Returns `true`
/// for the latter.
async fn wait_for_loss(link: &Link, cancel: &CancellationToken) -> bool {
    let mut state = link.subscribe();
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = async { state.wait_for(session_over).await.is_ok() } => false,
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Accepts one peer on `listener`, completes the handshake, and serves
/// the session until it ends. The host never listens again.
pub(crate) async fn run_host(
    listener: HostListener,
    link: Link,
    config: NetworkConfig,
    cancel: CancellationToken,
) {
    link.set_phase(LinkPhase::Accepting);
    info!(port = listener.port(), timeout = ?config.accept_timeout, "waiting for a player");

    let accepted = tokio::select! {
        _ = cancel.cancelled() => return,
        accepted = listener.accept_within(config.accept_timeout) => accepted,
    };
    let stream = match accepted {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "no player joined");
            link.stats().record_connection_error();
            link.set_phase(LinkPhase::Failed);
            return;
        }
    };

    let peer = stream.peer_addr();
    info!(%peer, "player connected");
    let tasks = start_connection(&link, stream, &config, cancel.child_token());

    link.set_phase(LinkPhase::HandshakeSent);
    let accepted = Message::ConnectionAccepted(ConnectionAccepted {
        assigned_player_id: PlayerId::CLIENT,
        timestamp: now_millis(),
    });
    match link.send(accepted) {
        Ok(()) => {
            link.mark_established(PlayerId::HOST);
            info!(%peer, "session established");
        }
        Err(e) => warn!(error = %e, "could not send handshake"),
    }

    let turn_away = cancel.child_token();
    let bouncer = tokio::spawn(turn_away_extra_peers(
        listener,
        frame_codec(&config),
        turn_away.clone(),
    ));

    let cancelled = wait_for_loss(&link, &cancel).await;
    turn_away.cancel();
    tasks.shutdown(&link, config.shutdown_timeout).await;
    if let Err(e) = bouncer.await {
        debug!(error = %e, "turn-away task ended abnormally");
    }

    if !cancelled {
        match link.state().farewell {
            Some(reason) => info!(%reason, "player left"),
            None => warn!("lost the player"),
        }
    }
    link.mark_dead("session over");
    link.set_phase(LinkPhase::Closed);
}

/// Answers every further dial with `GameOver { SessionFull }` until
/// `cancel` fires, then drops the listener.
async fn turn_away_extra_peers(
    listener: HostListener,
    codec: FrameCodec<JsonCodec>,
    cancel: CancellationToken,
) {
    let farewell = match codec.encode_frame(&Envelope::new(Message::game_over(
        GameOverReason::SessionFull,
    ))) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "cannot encode session-full notice");
            return;
        }
    };

    loop {
        let extra = tokio::select! {
            _ = cancel.cancelled() => break,
            extra = listener.accept() => extra,
        };
        let stream = match extra {
            Ok(stream) => stream,
            Err(e) => {
                debug!(error = %e, "accept failed while full");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let peer = stream.peer_addr();
        info!(%peer, "session full, turning player away");
        let (mut reader, mut writer) = stream.into_split();
        let notified = tokio::time::timeout(TURN_AWAY_TIMEOUT, async {
            writer.write_all(&farewell).await?;
            writer.shutdown().await?;
            // Read until the peer hangs up so the close is a FIN, not a
            // reset that could discard the notice.
            tokio::io::copy(&mut reader, &mut sink()).await?;
            Ok::<_, std::io::Error>(())
        })
        .await;
        if !matches!(notified, Ok(Ok(()))) {
            debug!(%peer, "turned-away peer did not hang up cleanly");
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Dials the host, and redials after a transport loss when
/// `auto_reconnect` is on, until the session ends.
pub(crate) async fn run_client(
    link: Link,
    config: NetworkConfig,
    host_ip: String,
    cancel: CancellationToken,
) {
    loop {
        let tasks = match connect_with_retry(&link, &config, &host_ip, &cancel).await {
            Ok(tasks) => tasks,
            Err(e) => {
                if !cancel.is_cancelled() {
                    error!(error = %e, host = %host_ip, "could not join host");
                    link.set_phase(LinkPhase::Failed);
                }
                return;
            }
        };

        let cancelled = wait_for_loss(&link, &cancel).await;
        link.mark_dead("connection ended");
        tasks.shutdown(&link, config.shutdown_timeout).await;
        let farewell = link.state().farewell;

        if cancelled {
            return;
        }
        if let Some(reason) = farewell {
            info!(%reason, "host ended the session");
            link.set_phase(LinkPhase::Closed);
            return;
        }
        if !config.auto_reconnect {
            warn!("lost the host");
            link.set_phase(LinkPhase::Closed);
            return;
        }

        link.stats().record_reconnect();
        warn!("lost the host, reconnecting");
    }
}

/// Runs up to `retry.attempts` dial-plus-handshake attempts.
async fn connect_with_retry(
    link: &Link,
    config: &NetworkConfig,
    host_ip: &str,
    cancel: &CancellationToken,
) -> Result<ConnectionTasks, BlastlinkError> {
    let attempts = config.retry.max_attempts();

    for attempt in 1..=attempts {
        match try_handshake(link, config, host_ip, cancel).await {
            Ok(tasks) => {
                info!(attempt, "joined host");
                return Ok(tasks);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "join attempt failed");
                link.stats().record_connection_error();
            }
        }

        if attempt < attempts {
            let delay = config.retry.next_delay();
            debug!(?delay, "waiting before next attempt");
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Shutdown.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    Err(BlastlinkError::AttemptsExhausted(attempts))
}

/// One attempt: dial, start the link, request, await acceptance.
async fn try_handshake(
    link: &Link,
    config: &NetworkConfig,
    host_ip: &str,
    cancel: &CancellationToken,
) -> Result<ConnectionTasks, BlastlinkError> {
    link.set_phase(LinkPhase::Dialing);
    let stream = tokio::select! {
        _ = cancel.cancelled() => return Err(TransportError::Shutdown.into()),
        dialed = dial(host_ip, config.port, config.retry.connect_timeout) => dialed?,
    };

    let tasks = start_connection(link, stream, config, cancel.child_token());
    link.set_phase(LinkPhase::AwaitingAccept);

    let request = Message::ConnectionRequest(ConnectionRequest {
        role: PeerRole::Client,
        timestamp: now_millis(),
    });
    let outcome = match link.send(request) {
        Ok(()) => await_acceptance(link, config.handshake_timeout, cancel).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(()) => Ok(tasks),
        Err(e) => {
            tasks.shutdown(link, config.shutdown_timeout).await;
            link.mark_dead("handshake failed");
            Err(e)
        }
    }
}

/// Waits for the receive loop to mark the link established, the host to
/// refuse us, or the socket to drop.
async fn await_acceptance(
    link: &Link,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), BlastlinkError> {
    let mut state = link.subscribe();
    let settled = tokio::select! {
        _ = cancel.cancelled() => return Err(TransportError::Shutdown.into()),
        settled = tokio::time::timeout(timeout, async {
            state
                .wait_for(|s| s.established || s.farewell.is_some() || !s.connected)
                .await
                .is_ok()
        }) => settled,
    };
    if settled.is_err() {
        return Err(BlastlinkError::HandshakeTimeout(timeout));
    }

    let state = link.state();
    if state.established {
        Ok(())
    } else if let Some(reason) = state.farewell {
        Err(BlastlinkError::Rejected(reason))
    } else {
        Err(BlastlinkError::HandshakeAborted)
    }
}
