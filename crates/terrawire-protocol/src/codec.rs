//! Per-message binary codecs.
//!
//! Every message struct implements [`Packet`]: a tag plus an
//! `encode`/`decode` pair that works field by field through a
//! [`PacketWriter`] / [`PacketReader`]. The reader and writer carry the
//! session's [`ProtocolVersion`], so the variable parts of a layout
//! (string encodings, color layout) are looked up there instead of being
//! baked into each message.
//!
//! The reader is bounds-checked on every call: a payload that is too short,
//! or a string whose declared length points past the end, yields
//! [`ProtocolError::Truncated`] and never reads out of range.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::{
    tag, Auth, Color, ConnectionApproved, FatalError, Gender, Message, PlayerAppearance,
    PlayerColors, PlayerLife, PlayerMana,
};
use crate::{ColorLayout, ProtocolError, ProtocolVersion, StringEncoding};

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A message type with a fixed tag and a binary layout.
pub trait Packet: Sized + Into<Message> {
    /// The frame tag this packet travels under.
    const TAG: u8;

    /// Appends this packet's payload bytes.
    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError>;

    /// Reads a packet from a payload.
    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError>;
}

/// Encodes a single packet's payload (no frame header).
pub fn encode_packet<P: Packet>(
    packet: &P,
    version: &ProtocolVersion,
) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    packet.encode(&mut PacketWriter::new(&mut buf, version))?;
    Ok(buf.freeze())
}

/// Decodes a single packet from its payload.
///
/// Bytes after the packet's layout are ignored, so newer peers may append
/// fields without breaking fixed-size messages.
pub fn decode_packet<P: Packet>(
    payload: &[u8],
    version: &ProtocolVersion,
) -> Result<P, ProtocolError> {
    P::decode(&mut PacketReader::new(payload, version))
}

impl Message {
    /// Encodes this message's payload under `version`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::StringTooLong`] if a string doesn't fit the
    /// version's encoding for that field.
    pub fn encode(&self, version: &ProtocolVersion) -> Result<Bytes, ProtocolError> {
        match self {
            Self::Auth(m) => encode_packet(m, version),
            Self::FatalError(m) => encode_packet(m, version),
            Self::ConnectionApproved(m) => encode_packet(m, version),
            Self::PlayerAppearance(m) => encode_packet(m, version),
            Self::PlayerLife(m) => encode_packet(m, version),
            Self::PlayerMana(m) => encode_packet(m, version),
        }
    }
}

// ---------------------------------------------------------------------------
// PacketReader
// ---------------------------------------------------------------------------

/// A bounds-checked cursor over one payload.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    version: &'a ProtocolVersion,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8], version: &'a ProtocolVersion) -> Self {
        Self { buf, version }
    }

    pub fn version(&self) -> &'a ProtocolVersion {
        self.version
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Takes the next `n` bytes, or fails without consuming anything.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.buf.len() {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn i16_le(&mut self) -> Result<i16, ProtocolError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn gender(&mut self) -> Result<Gender, ProtocolError> {
        self.u8().map(Gender::from)
    }

    /// Reads `N` colors using the version's [`ColorLayout`].
    pub fn colors<const N: usize>(&mut self) -> Result<[Color; N], ProtocolError> {
        let bytes = self.take(N * 3)?;
        let mut out = [Color::default(); N];
        match self.version.colors {
            ColorLayout::Interleaved => {
                for (color, rgb) in out.iter_mut().zip(bytes.chunks_exact(3)) {
                    *color = Color::new(rgb[0], rgb[1], rgb[2]);
                }
            }
            ColorLayout::Planar => {
                let (reds, rest) = bytes.split_at(N);
                let (greens, blues) = rest.split_at(N);
                for (i, color) in out.iter_mut().enumerate() {
                    *color = Color::new(reds[i], greens[i], blues[i]);
                }
            }
        }
        Ok(out)
    }

    /// Reads a string laid out as `encoding`.
    pub fn string(&mut self, encoding: StringEncoding) -> Result<String, ProtocolError> {
        let raw = match encoding {
            StringEncoding::Fixed { width } => {
                let field = self.take(width)?;
                let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
                &field[..end]
            }
            StringEncoding::LengthPrefixed => {
                let len = self.u8()? as usize;
                self.take(len)?
            }
            StringEncoding::ToEnd => self.take(self.buf.len())?,
        };

        String::from_utf8(raw.to_vec())
            .map_err(|e| ProtocolError::Malformed(format!("string is not valid UTF-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// PacketWriter
// ---------------------------------------------------------------------------

/// Appends payload fields to a buffer.
#[derive(Debug)]
pub struct PacketWriter<'a> {
    buf: &'a mut BytesMut,
    version: &'a ProtocolVersion,
}

impl<'a> PacketWriter<'a> {
    pub fn new(buf: &'a mut BytesMut, version: &'a ProtocolVersion) -> Self {
        Self { buf, version }
    }

    pub fn version(&self) -> &'a ProtocolVersion {
        self.version
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_i16_le(&mut self, v: i16) {
        self.buf.put_i16_le(v);
    }

    pub fn put_gender(&mut self, g: Gender) {
        self.buf.put_u8(g.into());
    }

    /// Writes colors using the version's [`ColorLayout`].
    pub fn put_colors(&mut self, colors: &[Color]) {
        match self.version.colors {
            ColorLayout::Interleaved => {
                for c in colors {
                    self.buf.put_slice(&[c.r, c.g, c.b]);
                }
            }
            ColorLayout::Planar => {
                colors.iter().for_each(|c| self.buf.put_u8(c.r));
                colors.iter().for_each(|c| self.buf.put_u8(c.g));
                colors.iter().for_each(|c| self.buf.put_u8(c.b));
            }
        }
    }

    /// Writes a string laid out as `encoding`.
    ///
    /// Never truncates: a string that doesn't fit is an error.
    pub fn put_string(&mut self, s: &str, encoding: StringEncoding) -> Result<(), ProtocolError> {
        let bytes = s.as_bytes();
        match encoding {
            StringEncoding::Fixed { width } => {
                // Decoding stops at the first NUL.
                if bytes.contains(&0) {
                    return Err(ProtocolError::Malformed(
                        "fixed-width string contains a NUL byte".into(),
                    ));
                }
                if bytes.len() > width {
                    return Err(ProtocolError::StringTooLong {
                        len: bytes.len(),
                        max: width,
                    });
                }
                self.buf.put_slice(bytes);
                self.buf.put_bytes(0, width - bytes.len());
            }
            StringEncoding::LengthPrefixed => {
                let len = u8::try_from(bytes.len()).map_err(|_| ProtocolError::StringTooLong {
                    len: bytes.len(),
                    max: u8::MAX as usize,
                })?;
                self.buf.put_u8(len);
                self.buf.put_slice(bytes);
            }
            StringEncoding::ToEnd => self.buf.put_slice(bytes),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Packet impls
// ---------------------------------------------------------------------------

impl Packet for Auth {
    const TAG: u8 = tag::AUTH;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_string(&self.version, w.version().auth_version)
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let version = r.string(r.version().auth_version)?;
        Ok(Self { version })
    }
}

impl Packet for FatalError {
    const TAG: u8 = tag::FATAL_ERROR;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_u8(self.offset);
        w.put_string(&self.text, w.version().error_text)
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let offset = r.u8()?;
        let text = r.string(r.version().error_text)?;
        Ok(Self { offset, text })
    }
}

impl Packet for ConnectionApproved {
    const TAG: u8 = tag::CONNECTION_APPROVED;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_u8(self.player_slot);
        Ok(())
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_slot: r.u8()?,
        })
    }
}

impl Packet for PlayerAppearance {
    const TAG: u8 = tag::PLAYER_APPEARANCE;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_u8(self.slot);
        w.put_u8(self.hair_style);
        w.put_gender(self.gender);
        w.put_colors(&self.colors.to_array());
        w.put_u8(self.difficulty);
        w.put_string(&self.name, w.version().player_name)
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        // slot, hair, gender, 7 colors, difficulty
        const FIXED_PREFIX: usize = 3 + PlayerColors::COUNT * 3 + 1;
        if r.remaining() < FIXED_PREFIX {
            return Err(ProtocolError::Truncated {
                needed: FIXED_PREFIX,
                remaining: r.remaining(),
            });
        }

        let slot = r.u8()?;
        let hair_style = r.u8()?;
        let gender = r.gender()?;
        let colors = PlayerColors::from_array(r.colors()?);
        let difficulty = r.u8()?;
        let name = r.string(r.version().player_name)?;

        Ok(Self {
            slot,
            hair_style,
            gender,
            colors,
            difficulty,
            name,
        })
    }
}

impl Packet for PlayerLife {
    const TAG: u8 = tag::PLAYER_LIFE;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_u8(self.slot);
        w.put_i16_le(self.current);
        w.put_i16_le(self.max);
        Ok(())
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.u8()?,
            current: r.i16_le()?,
            max: r.i16_le()?,
        })
    }
}

impl Packet for PlayerMana {
    const TAG: u8 = tag::PLAYER_MANA;

    fn encode(&self, w: &mut PacketWriter<'_>) -> Result<(), ProtocolError> {
        w.put_u8(self.slot);
        w.put_i16_le(self.level);
        w.put_i16_le(self.max);
        Ok(())
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.u8()?,
            level: r.i16_le()?,
            max: r.i16_le()?,
        })
    }
}
