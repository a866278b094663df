//! TCP listener and dialer for the two peers.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::TransportError;

/// A connected TCP stream together with the peer's address.
#[derive(Debug)]
pub struct PeerStream {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl PeerStream {
    fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        // Player state is small and latency-sensitive; don't let Nagle
        // batch it.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "could not disable Nagle");
        }
        Self { stream, peer_addr }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Splits into independently owned read and write halves so the
    /// receive loop and the writer can run as separate tasks.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

// ---------------------------------------------------------------------------
// Host side
// ---------------------------------------------------------------------------

/// The host's listening socket.
///
/// Binds every interface so a LAN peer can reach it. Dropping the listener
/// closes the port, which is how the host refuses a second player.
pub struct HostListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HostListener {
    /// Binds `0.0.0.0:port`, walking up to `fallback_attempts` following
    /// ports if the preferred one is already taken.
    ///
    /// Port 0 asks the OS for any free port and never falls back.
    ///
    /// # Errors
    /// [`TransportError::BindFailed`] carrying the last bind error.
    pub async fn bind(port: u16, fallback_attempts: u16) -> Result<Self, TransportError> {
        let mut last_error = None;

        for candidate in candidate_ports(port, fallback_attempts) {
            match TcpListener::bind((Ipv4Addr::UNSPECIFIED, candidate)).await {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(|source| {
                        TransportError::BindFailed {
                            port: candidate,
                            source,
                        }
                    })?;
                    if candidate != port {
                        tracing::warn!(
                            preferred = port,
                            bound = local_addr.port(),
                            "preferred port busy, using fallback"
                        );
                    }
                    tracing::info!(%local_addr, "host listening");
                    return Ok(Self {
                        listener,
                        local_addr,
                    });
                }
                Err(e) => {
                    tracing::debug!(port = candidate, error = %e, "bind failed");
                    last_error = Some((candidate, e));
                }
            }
        }

        let (port, source) = last_error.unwrap_or_else(|| {
            (
                port,
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no candidate ports"),
            )
        });
        Err(TransportError::BindFailed { port, source })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Waits at most `wait` for one inbound connection.
    ///
    /// # Errors
    /// [`TransportError::AcceptTimedOut`] when nobody connects in time,
    /// [`TransportError::AcceptFailed`] on a socket error.
    pub async fn accept_within(&self, wait: Duration) -> Result<PeerStream, TransportError> {
        let (stream, peer_addr) = tokio::time::timeout(wait, self.listener.accept())
            .await
            .map_err(|_| TransportError::AcceptTimedOut(wait))?
            .map_err(TransportError::AcceptFailed)?;

        tracing::debug!(%peer_addr, "accepted peer");
        Ok(PeerStream::new(stream, peer_addr))
    }

    /// Waits for the next inbound connection with no deadline.
    pub async fn accept(&self) -> Result<PeerStream, TransportError> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PeerStream::new(stream, peer_addr))
    }
}

/// The preferred port followed by its fallbacks, stopping at `u16::MAX`.
fn candidate_ports(port: u16, fallback_attempts: u16) -> impl Iterator<Item = u16> {
    let extra = if port == 0 { 0 } else { fallback_attempts };
    (0..=extra).map_while(move |offset| port.checked_add(offset))
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Opens one TCP connection to `host:port`, giving up after `connect_timeout`.
///
/// # Errors
/// [`TransportError::ConnectTimedOut`] or [`TransportError::ConnectFailed`];
/// both are retryable.
pub async fn dial(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<PeerStream, TransportError> {
    let addr = format!("{host}:{port}");

    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TransportError::ConnectTimedOut {
            addr: addr.clone(),
            timeout: connect_timeout,
        })?
        .map_err(|source| TransportError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;

    let peer_addr = stream
        .peer_addr()
        .map_err(|source| TransportError::ConnectFailed { addr, source })?;

    tracing::debug!(%peer_addr, "connected to host");
    Ok(PeerStream::new(stream, peer_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ports_include_preferred_then_fallbacks() {
        let ports: Vec<u16> = candidate_ports(4040, 3).collect();
        assert_eq!(ports, vec![4040, 4041, 4042, 4043]);
    }

    #[test]
    fn test_candidate_ports_stop_at_u16_max() {
        let ports: Vec<u16> = candidate_ports(u16::MAX - 1, 5).collect();
        assert_eq!(ports, vec![u16::MAX - 1, u16::MAX]);
    }

    #[test]
    fn test_candidate_ports_zero_never_falls_back() {
        let ports: Vec<u16> = candidate_ports(0, 10).collect();
        assert_eq!(ports, vec![0]);
    }
}
