use std::io;
use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No candidate port could be bound.
    #[error("could not bind port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Accepting the peer's connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// Nobody connected within the accept window.
    #[error("no peer connected within {0:?}")]
    AcceptTimedOut(Duration),

    /// The TCP connect was refused, reset, or otherwise failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The TCP connect did not complete in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimedOut { addr: String, timeout: Duration },

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether a client dialing the host should try again.
    ///
    /// Refused, timed-out and reset connects are all worth another attempt:
    /// the host may simply not be listening yet.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::ConnectTimedOut { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_failures_are_retryable() {
        let refused = TransportError::ConnectFailed {
            addr: "127.0.0.1:4040".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let timed_out = TransportError::ConnectTimedOut {
            addr: "127.0.0.1:4040".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(refused.is_retryable());
        assert!(timed_out.is_retryable());
    }

    #[test]
    fn test_host_side_failures_are_terminal() {
        assert!(!TransportError::AcceptTimedOut(Duration::from_secs(30)).is_retryable());
        assert!(!TransportError::Shutdown.is_retryable());
    }

    #[test]
    fn test_display_includes_address() {
        let err = TransportError::ConnectTimedOut {
            addr: "10.0.0.7:4040".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("10.0.0.7:4040"));
    }
}
