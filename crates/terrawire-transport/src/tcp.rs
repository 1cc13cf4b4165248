//! TCP transport implementation using `tokio::net::TcpStream`.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::{Transport, TransportError};

/// A [`Transport`] that dials plain TCP connections.
///
/// ```rust
/// use std::time::Duration;
/// use terrawire_transport::TcpTransport;
///
/// let transport = TcpTransport::new()
///     .nodelay(true)
///     .connect_timeout(Some(Duration::from_secs(3)));
/// # let _ = transport;
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
    connect_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Creates a transport with `TCP_NODELAY` on and a 10 second connect timeout.
    pub fn new() -> Self {
        Self {
            nodelay: true,
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Enables or disables Nagle's algorithm on new connections.
    ///
    /// Game frames are small and latency-sensitive, so the default is `true`
    /// (Nagle off).
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Sets how long a connect attempt may take. `None` waits for the OS.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn connect(&self, addr: &str) -> Result<Self::Stream, TransportError> {
        let connecting = TcpStream::connect(addr);
        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| TransportError::ConnectTimeout {
                    addr: addr.to_string(),
                })?,
            None => connecting.await,
        };

        let stream = result.map_err(|source| TransportError::ConnectFailed {
            addr: addr.to_string(),
            source,
        })?;

        if let Err(e) = stream.set_nodelay(self.nodelay) {
            // Not fatal: the connection still works, just with Nagle's default.
            tracing::warn!(addr, error = %e, "failed to set TCP_NODELAY");
        }

        tracing::debug!(addr, nodelay = self.nodelay, "TCP connection established");
        Ok(stream)
    }
}
