//! TCP transport for blastlink.
//!
//! Provides the socket plumbing both peers need and nothing more:
//!
//! - [`HostListener`]: bind with port fallback, accept one peer within a
//!   deadline.
//! - [`dial`]: connect to the host with a per-attempt timeout.
//! - [`RetryPolicy`]: how many times and how patiently a client redials.
//! - [`local_ip_hint`]: the LAN address a host should tell its friend.
//!
//! Framing, handshakes and liveness live in the layers above.

mod error;
mod retry;
mod tcp;

pub use error::TransportError;
pub use retry::RetryPolicy;
pub use tcp::{HostListener, PeerStream, dial};

use std::net::{IpAddr, Ipv4Addr};

/// Best guess at this machine's LAN address.
///
/// "Connects" a UDP socket to a public address, which picks the outbound
/// interface without sending a packet. Falls back to loopback when the
/// machine has no route.
pub async fn local_ip_hint() -> IpAddr {
    async fn probe() -> std::io::Result<IpAddr> {
        let socket = tokio::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
        Ok(socket.local_addr()?.ip())
    }

    match probe().await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!(error = %e, "no outbound route, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
