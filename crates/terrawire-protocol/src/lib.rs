//! Wire protocol for Terrawire.
//!
//! This crate defines the bytes a Terrawire client and server exchange:
//!
//! - **Frames** ([`FrameCodec`], [`FrameReader`], [`FrameWriter`]): the
//!   length-prefixed envelope, with no knowledge of what's inside.
//! - **Messages** ([`Message`] and its variants): the typed payloads.
//! - **Packet codecs** ([`Packet`], [`PacketReader`], [`PacketWriter`]):
//!   per-message binary layouts.
//! - **Dispatch** ([`Dispatcher`]): tag → codec lookup and routing.
//! - **Versions** ([`ProtocolVersion`]): the per-revision layout choices
//!   every codec consults.
//!
//! # Architecture
//!
//! ```text
//! bytes ─→ FrameReader ─→ (tag, payload) ─→ Dispatcher ─→ Message ─→ sink
//! Message ─→ Message::encode ─→ payload ─→ FrameWriter ─→ bytes
//! ```
//!
//! Nothing here owns a socket or a session; see `terrawire-session` for that.

mod codec;
mod dispatch;
mod error;
mod frame;
mod types;
mod version;

pub use codec::{decode_packet, encode_packet, Packet, PacketReader, PacketWriter};
pub use dispatch::{
    DispatchSink, Dispatched, Dispatcher, HandshakeSignal, PacketCodec, TypedCodec,
};
pub use error::ProtocolError;
pub use frame::{Frame, FrameCodec, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_LEN, HEADER_LEN};
pub use types::{
    tag, Auth, Color, ConnectionApproved, FatalError, Gender, Message, PlayerAppearance,
    PlayerColors, PlayerLife, PlayerMana, Role,
};
pub use version::{ColorLayout, LengthConvention, ProtocolVersion, StringEncoding};
