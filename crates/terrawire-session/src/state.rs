//! Lifecycle state of a client session.

use std::fmt;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Disconnected ──connect──→ Connecting ──stream open──→ AwaitingHandshake
///                                 │                              │
///                                 │                  ConnectionApproved
///                                 │                              ↓
///                                 └──────────→ Closed ←──────── Ready
/// ```
///
/// Every state can move to `Closed`; nothing leaves it. A session is
/// single-use: once closed it stays closed, and reconnecting means building
/// a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Built, not yet connected.
    Disconnected,

    /// The transport is opening the stream.
    Connecting,

    /// `Auth` has been sent; waiting for `ConnectionApproved`.
    AwaitingHandshake,

    /// Handshake done; the receive loop is running.
    Ready,

    /// Terminal.
    Closed,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// `true` once a stream exists and has not been closed, i.e. when
    /// `send` can reach the wire.
    pub fn has_stream(&self) -> bool {
        matches!(self, Self::AwaitingHandshake | Self::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHandshake => "awaiting-handshake",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// CloseReason
// ---------------------------------------------------------------------------

/// Why a session closed. Delivered exactly once, in
/// [`SessionEvent::Closed`](crate::SessionEvent::Closed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the stream at a frame boundary.
    EndOfStream,

    /// The server sent `FatalError`.
    Fatal { offset: u8, text: String },

    /// The application called `disconnect` (or dropped the session).
    Disconnected,

    /// A transport, framing, or decode failure, or a handshake timeout.
    /// The error itself was reported just before.
    Failed,
}

impl CloseReason {
    /// `true` for closes nobody would call a failure.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Disconnected)
    }
}
