//! Length-prefixed frame envelope.
//!
//! Every unit on the wire looks like this (all integers little-endian):
//!
//! ```text
//! ┌──────────────┬──────────┬─────────────────────┐
//! │ length: u32  │ tag: u8  │ payload: [u8; ...]  │
//! └──────────────┴──────────┴─────────────────────┘
//! ```
//!
//! What `length` counts depends on the [`LengthConvention`] of the
//! protocol version. This module owns no protocol semantics: it moves
//! `(tag, payload)` pairs on and off a byte stream and nothing more.
//!
//! TCP delivers a stream, not messages, so a single `read` may return half
//! a header or three frames at once. [`FrameCodec::decode`] works on an
//! accumulating `BytesMut` and only yields a frame once all of its bytes
//! are buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{LengthConvention, ProtocolError};

/// Size of the fixed frame header: 4 length bytes + 1 tag byte.
pub const HEADER_LEN: usize = 5;

/// Default cap on a frame's declared length (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1_048_576;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One frame: a type tag and its raw payload.
///
/// Frames are short-lived. They exist between the socket and the packet
/// codecs for exactly one read or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message type discriminator.
    pub tag: u8,
    /// The type-specific body, without header.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame from a tag and anything convertible into `Bytes`.
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// The value this frame carries in its length field under `convention`.
    pub fn length(&self, convention: LengthConvention) -> Result<u32, ProtocolError> {
        encoded_length(self.payload.len(), convention, usize::MAX)
    }
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Pure, buffer-driven frame encoder/decoder.
///
/// Holds only configuration, so it is `Copy` and can be shared freely
/// between the read and write halves of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    convention: LengthConvention,
    max_frame_len: usize,
}

impl FrameCodec {
    /// Creates a codec with the default 1 MiB frame cap.
    pub fn new(convention: LengthConvention) -> Self {
        Self {
            convention,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Sets the largest length value accepted or produced. Clamped to at
    /// least one header's worth so empty frames always fit.
    pub fn max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max.max(self.convention.overhead() as usize);
        self
    }

    /// The configured length convention.
    pub fn convention(&self) -> LengthConvention {
        self.convention
    }

    /// Tries to split one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; `buf` is left
    /// untouched in that case so the caller can append and retry.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidLength`] if the length can't even cover the header part it counts.
    /// - [`ProtocolError::FrameTooLarge`] if the length exceeds the cap.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let overhead = self.convention.overhead();
        if length < overhead {
            return Err(ProtocolError::InvalidLength {
                length,
                minimum: overhead,
            });
        }
        if length as usize > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                size: length as usize,
                max: self.max_frame_len,
            });
        }

        let payload_len = (length - overhead) as usize;
        let total = HEADER_LEN + payload_len;
        if buf.len() < total {
            // Safe to reserve now that the length passed the cap check.
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        buf.advance(4);
        let tag = buf.get_u8();
        let payload = buf.split_to(payload_len).freeze();
        Ok(Some(Frame { tag, payload }))
    }

    /// Appends the encoded frame `(tag, payload)` to `dst`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] if the resulting length
    /// field would exceed the cap (or not fit in a `u32`).
    pub fn encode(&self, tag: u8, payload: &[u8], dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let length = encoded_length(payload.len(), self.convention, self.max_frame_len)?;
        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u32_le(length);
        dst.put_u8(tag);
        dst.put_slice(payload);
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(LengthConvention::default())
    }
}

fn encoded_length(
    payload_len: usize,
    convention: LengthConvention,
    max: usize,
) -> Result<u32, ProtocolError> {
    let size = payload_len.saturating_add(convention.overhead() as usize);
    if size > max {
        return Err(ProtocolError::FrameTooLarge { size, max });
    }
    u32::try_from(size).map_err(|_| ProtocolError::FrameTooLarge {
        size,
        max: u32::MAX as usize,
    })
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// Reads frames from an async byte stream.
///
/// Only one task should own a `FrameReader`; socket reads are single-owner.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<R> FrameReader<R> {
    pub fn new(inner: R, codec: FrameCodec) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * 1024),
            codec,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Reads the next frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` for a complete frame,
    /// - `Ok(None)` when the peer closed cleanly at a frame boundary,
    /// - `Err(ConnectionClosed)` when the peer closed mid-frame.
    ///
    /// Cancel-safe: bytes already read stay buffered for the next call,
    /// so this can sit inside `tokio::select!`.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::ConnectionClosed {
                    buffered: self.buf.len(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FrameWriter
// ---------------------------------------------------------------------------

/// Writes frames to an async byte stream.
///
/// Each frame is assembled in one buffer and handed to the stream with a
/// single `write_all`, so a frame is never split across two write calls.
/// Callers sharing a writer between tasks still need a lock around it.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<W> FrameWriter<W> {
    pub fn new(inner: W, codec: FrameCodec) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(256),
            codec,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Encodes and writes one frame, then flushes.
    pub async fn write_frame(&mut self, tag: u8, payload: &[u8]) -> Result<(), ProtocolError> {
        self.buf.clear();
        self.codec.encode(tag, payload, &mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts down the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
