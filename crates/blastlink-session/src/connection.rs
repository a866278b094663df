//! Spawning and stopping the tasks that serve one socket.

use std::net::SocketAddr;
use std::time::Duration;

use blastlink_protocol::{Codec, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::heartbeat::run_heartbeat_monitor;
use crate::link::Link;
use crate::receiver::run_receive_loop;
use crate::writer::run_writer;

/// The receive loop, writer and heartbeat monitor of one socket.
///
/// All three share one cancellation token. Dropping this value does not
/// stop them; call [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct ConnectionTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ConnectionTasks {
    /// Marks `link` connected to `peer`, attaches a fresh outbound queue,
    /// and spawns the three tasks on the current runtime.
    pub fn spawn<R, W, C>(
        link: &Link,
        reader: R,
        writer: W,
        codec: FrameCodec<C>,
        cancel: CancellationToken,
        peer: SocketAddr,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        C: Codec + Clone,
    {
        link.mark_connected(peer);
        let outbound = link.attach();

        let handles = vec![
            tokio::spawn(run_receive_loop(
                reader,
                link.clone(),
                codec.clone(),
                cancel.clone(),
                Some(peer),
            )),
            tokio::spawn(run_writer(
                writer,
                outbound,
                link.clone(),
                codec,
                cancel.clone(),
            )),
            tokio::spawn(run_heartbeat_monitor(link.clone(), cancel.clone())),
        ];
        debug!(%peer, "connection tasks started");

        Self { cancel, handles }
    }

    /// Cancels the tasks and waits up to `within` for them to finish.
    ///
    /// The writer flushes whatever was queued before the cancel, so a
    /// farewell sent just before calling this still reaches the peer.
    pub async fn shutdown(self, link: &Link, within: Duration) {
        self.cancel.cancel();
        let joined = tokio::time::timeout(
            within,
            futures_util::future::join_all(self.handles),
        )
        .await;
        if joined.is_err() {
            warn!(?within, "connection tasks did not stop in time");
        }
        link.detach();
    }
}
