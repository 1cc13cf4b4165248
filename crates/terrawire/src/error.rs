//! Unified error type for the Terrawire crates.

use terrawire_protocol::ProtocolError;
use terrawire_session::SessionError;
use terrawire_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Applications using the `terrawire` facade deal with this single type
/// instead of importing errors from each sub-crate. `#[from]` generates
/// the `From` impls, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TerrawireError {
    /// Opening the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Framing or encoding failed outside a session.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Handshake, send, or receive failure.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TerrawireError {
    /// The server's rejection, if that is what this error is.
    pub fn rejection(&self) -> Option<(u8, &str)> {
        match self {
            Self::Session(SessionError::Rejected { offset, text }) => Some((*offset, text)),
            _ => None,
        }
    }
}
