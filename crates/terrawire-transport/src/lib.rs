//! Transport abstraction layer for Terrawire.
//!
//! The protocol engine only needs a raw, bidirectional byte stream. This
//! crate provides the [`Transport`] trait that produces such a stream and a
//! plain TCP implementation, [`TcpTransport`].
//!
//! The stream type is any tokio `AsyncRead + AsyncWrite`, which maps the
//! collaborator interface directly:
//!
//! | Operation  | tokio call                |
//! |------------|---------------------------|
//! | read some  | `AsyncReadExt::read_buf`  |
//! | write all  | `AsyncWriteExt::write_all`|
//! | close      | `AsyncWriteExt::shutdown` |
//!
//! Nothing in here retries. A failed connect surfaces once to the caller.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::TcpTransport;

use tokio::io::{AsyncRead, AsyncWrite};

/// Opens byte streams to a remote peer.
///
/// Implemented by [`TcpTransport`] for real sockets. Tests implement it
/// over `tokio::io::duplex` to get an in-memory socket pair.
pub trait Transport: Send + Sync + 'static {
    /// The stream produced by a successful connect.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connects to `addr` (e.g. `"127.0.0.1:7777"`).
    async fn connect(&self, addr: &str) -> Result<Self::Stream, TransportError>;
}
