//! Error types for the session layer.

use terrawire_protocol::ProtocolError;
use terrawire_transport::TransportError;

/// Errors that can occur while connecting, sending, or receiving.
///
/// Errors from the receive loop reach the application once, as a
/// [`SessionEvent::Error`](crate::SessionEvent::Error), right before the
/// session closes. Errors from `connect` and `send` are returned directly
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has no open connection: it was never connected, or it
    /// has already closed.
    #[error("session is not connected")]
    NotConnected,

    /// `connect` was called on a session that has already been started.
    /// Sessions are single-use; build a new one to reconnect.
    #[error("session was already started")]
    AlreadyStarted,

    /// The server answered the handshake with `FatalError`.
    #[error("server rejected the connection (offset {offset}): {text}")]
    Rejected { offset: u8, text: String },

    /// The server (or a local `disconnect`) closed the connection before
    /// the handshake finished.
    #[error("connection closed during handshake")]
    ClosedDuringHandshake,

    /// No `ConnectionApproved`/`FatalError` arrived within the configured
    /// handshake timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Framing or codec failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport could not open a connection.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
