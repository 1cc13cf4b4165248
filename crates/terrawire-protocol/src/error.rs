//! Error types for the protocol layer.
//!
//! Each crate in Terrawire defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire were wrong (or could not be
//! produced), never that the network or the session misbehaved.

/// Errors that can occur while framing, encoding, or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The peer closed the stream in the middle of a frame.
    ///
    /// A close exactly at a frame boundary is *not* an error: the frame
    /// reader reports it as `Ok(None)` (end of stream).
    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    ConnectionClosed { buffered: usize },

    /// A frame declared (or would need) a length above the configured maximum.
    ///
    /// Checked before any payload buffer is allocated, so a corrupt or
    /// hostile length field can't make us reserve gigabytes.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The length field is smaller than the header bytes it must cover.
    #[error("invalid frame length {length}: must be at least {minimum}")]
    InvalidLength { length: u32, minimum: u32 },

    /// The payload ended before a field could be read.
    ///
    /// Also produced when a declared string length points past the end
    /// of the payload.
    #[error("malformed payload: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The payload has the right size but invalid content
    /// (e.g. a string that isn't UTF-8).
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A string is too long for the field encoding selected by the
    /// protocol version (fixed width or `u8` length prefix).
    #[error("string of {len} bytes does not fit a {max}-byte field")]
    StringTooLong { len: usize, max: usize },

    /// Reading from or writing to the underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns `true` for payload-level decode failures
    /// ([`Truncated`](Self::Truncated) and [`Malformed`](Self::Malformed)).
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::Malformed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_malformed_covers_payload_errors_only() {
        assert!(ProtocolError::Truncated { needed: 2, remaining: 1 }.is_malformed());
        assert!(ProtocolError::Malformed("bad".into()).is_malformed());
        assert!(!ProtocolError::ConnectionClosed { buffered: 3 }.is_malformed());
        assert!(!ProtocolError::FrameTooLarge { size: 10, max: 5 }.is_malformed());
    }

    #[test]
    fn test_display_includes_sizes() {
        let err = ProtocolError::FrameTooLarge { size: 2_000_000, max: 1_048_576 };
        let text = err.to_string();
        assert!(text.contains("2000000"));
        assert!(text.contains("1048576"));
    }
}
