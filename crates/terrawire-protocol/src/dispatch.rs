//! Tag → codec registry and message routing.
//!
//! The dispatcher is the only place that knows which tag means which
//! message. Inbound frames go in as `(tag, payload)`; decoded messages (or
//! raw unknown frames) come out through a [`DispatchSink`].
//!
//! Unknown tags are not errors. The protocol keeps growing new message
//! types, so a frame we can't decode is handed to the sink as raw bytes
//! and the connection carries on.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;

use crate::types::{
    tag, Auth, ConnectionApproved, FatalError, Message, PlayerAppearance, PlayerLife, PlayerMana,
    Role,
};
use crate::{decode_packet, Packet, ProtocolError, ProtocolVersion};

// ---------------------------------------------------------------------------
// PacketCodec
// ---------------------------------------------------------------------------

/// Something that can turn one tag's payload into a [`Message`].
///
/// Implemented by [`TypedCodec`] for any [`Packet`], and by plain
/// functions/closures with the matching signature.
pub trait PacketCodec: Send + Sync + 'static {
    fn decode(&self, payload: &[u8], version: &ProtocolVersion) -> Result<Message, ProtocolError>;
}

impl<F> PacketCodec for F
where
    F: Fn(&[u8], &ProtocolVersion) -> Result<Message, ProtocolError> + Send + Sync + 'static,
{
    fn decode(&self, payload: &[u8], version: &ProtocolVersion) -> Result<Message, ProtocolError> {
        self(payload, version)
    }
}

/// The [`PacketCodec`] for packet type `P`.
pub struct TypedCodec<P>(PhantomData<fn() -> P>);

impl<P> TypedCodec<P> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<P> Default for TypedCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Packet + 'static> PacketCodec for TypedCodec<P> {
    fn decode(&self, payload: &[u8], version: &ProtocolVersion) -> Result<Message, ProtocolError> {
        decode_packet::<P>(payload, version).map(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a delivered message means for the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeSignal {
    /// Ordinary traffic.
    None,
    /// `ConnectionApproved`: the handshake succeeded.
    Approved { slot: u8 },
    /// `FatalError`: the server gave up on us; the session must close.
    Fatal { offset: u8, text: String },
}

impl HandshakeSignal {
    /// Returns the signal carried by `message`.
    pub fn of(message: &Message) -> Self {
        match message {
            Message::ConnectionApproved(m) => Self::Approved {
                slot: m.player_slot,
            },
            Message::FatalError(m) => Self::Fatal {
                offset: m.offset,
                text: m.text.clone(),
            },
            _ => Self::None,
        }
    }

    /// `true` if this signal ends the blocking handshake wait.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Result of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The frame decoded and was handed to [`DispatchSink::message`].
    Delivered(HandshakeSignal),
    /// No codec for this tag; the raw frame went to [`DispatchSink::unknown`].
    Unknown,
}

/// Receives the output of [`Dispatcher::dispatch`].
pub trait DispatchSink {
    /// A successfully decoded message.
    fn message(&mut self, message: Message);

    /// A frame whose tag has no registered codec.
    fn unknown(&mut self, tag: u8, payload: Bytes);
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Maps tags to codecs for one side of the connection.
///
/// ```rust
/// use terrawire_protocol::{Dispatcher, Message, ProtocolVersion, Role};
///
/// let dispatcher = Dispatcher::for_role(Role::Client, ProtocolVersion::default());
/// let msg = dispatcher.decode(0x10, &[1, 100, 0, 200, 0]).unwrap().unwrap();
/// assert!(matches!(msg, Message::PlayerLife(_)));
/// ```
pub struct Dispatcher {
    role: Role,
    version: ProtocolVersion,
    codecs: HashMap<u8, Box<dyn PacketCodec>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no codecs registered.
    pub fn new(role: Role, version: ProtocolVersion) -> Self {
        Self {
            role,
            version,
            codecs: HashMap::new(),
        }
    }

    /// Creates a dispatcher with the standard tag table for `role`.
    ///
    /// Tag 1 decodes as `FatalError` for a client and as `Auth` for a server.
    pub fn for_role(role: Role, version: ProtocolVersion) -> Self {
        let mut d = Self::new(role, version);
        match role {
            Role::Client => d.register(tag::FATAL_ERROR, TypedCodec::<FatalError>::new()),
            Role::Server => d.register(tag::AUTH, TypedCodec::<Auth>::new()),
        }
        d.register(tag::CONNECTION_APPROVED, TypedCodec::<ConnectionApproved>::new());
        d.register(tag::PLAYER_APPEARANCE, TypedCodec::<PlayerAppearance>::new());
        d.register(tag::PLAYER_LIFE, TypedCodec::<PlayerLife>::new());
        d.register(tag::PLAYER_MANA, TypedCodec::<PlayerMana>::new());
        d
    }

    /// Registers `codec` for `tag`, replacing any previous codec.
    pub fn register(&mut self, tag: u8, codec: impl PacketCodec) {
        if self.codecs.insert(tag, Box::new(codec)).is_some() {
            tracing::debug!(tag, "replaced codec");
        }
    }

    /// Registers the codec of packet type `P` under `P::TAG`.
    pub fn register_packet<P: Packet + 'static>(&mut self) {
        self.register(P::TAG, TypedCodec::<P>::new());
    }

    pub fn is_registered(&self, tag: u8) -> bool {
        self.codecs.contains_key(&tag)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    /// Decodes a payload without routing it.
    ///
    /// Returns `Ok(None)` for an unregistered tag.
    pub fn decode(&self, tag: u8, payload: &[u8]) -> Result<Option<Message>, ProtocolError> {
        match self.codecs.get(&tag) {
            Some(codec) => codec.decode(payload, &self.version).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes one frame and hands the result to `sink`.
    ///
    /// # Errors
    /// Returns the codec's error if a registered tag fails to decode.
    /// Nothing is passed to the sink in that case.
    pub fn dispatch(
        &self,
        tag: u8,
        payload: Bytes,
        sink: &mut impl DispatchSink,
    ) -> Result<Dispatched, ProtocolError> {
        match self.decode(tag, &payload)? {
            Some(message) => {
                let signal = HandshakeSignal::of(&message);
                tracing::trace!(tag, message = message.name(), "dispatching message");
                sink.message(message);
                Ok(Dispatched::Delivered(signal))
            }
            None => {
                tracing::debug!(tag, len = payload.len(), "unknown message tag");
                sink.unknown(tag, payload);
                Ok(Dispatched::Unknown)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<u8> = self.codecs.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("role", &self.role)
            .field("version", &self.version.client_version)
            .field("tags", &tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records everything the dispatcher hands over.
    #[derive(Default)]
    struct Recorder {
        messages: Vec<Message>,
        unknown: Vec<(u8, Bytes)>,
    }

    impl DispatchSink for Recorder {
        fn message(&mut self, message: Message) {
            self.messages.push(message);
        }

        fn unknown(&mut self, tag: u8, payload: Bytes) {
            self.unknown.push((tag, payload));
        }
    }

    fn client() -> Dispatcher {
        Dispatcher::for_role(Role::Client, ProtocolVersion::default())
    }

    #[test]
    fn test_dispatch_known_tag_delivers_message() {
        let mut sink = Recorder::default();
        let out = client()
            .dispatch(0x10, Bytes::from_static(&[1, 100, 0, 200, 0]), &mut sink)
            .unwrap();
        assert_eq!(out, Dispatched::Delivered(HandshakeSignal::None));
        assert_eq!(
            sink.messages,
            vec![Message::PlayerLife(PlayerLife { slot: 1, current: 100, max: 200 })]
        );
    }

    #[test]
    fn test_dispatch_unknown_tag_goes_to_fallback() {
        let mut sink = Recorder::default();
        let out = client()
            .dispatch(0x99, Bytes::from_static(b"future"), &mut sink)
            .unwrap();
        assert_eq!(out, Dispatched::Unknown);
        assert!(sink.messages.is_empty());
        assert_eq!(sink.unknown, vec![(0x99, Bytes::from_static(b"future"))]);
    }

    #[test]
    fn test_client_reads_tag_one_as_fatal_error() {
        let mut sink = Recorder::default();
        let out = client()
            .dispatch(1, Bytes::from_static(b"\x03kicked"), &mut sink)
            .unwrap();
        assert_eq!(
            out,
            Dispatched::Delivered(HandshakeSignal::Fatal {
                offset: 3,
                text: "kicked".into()
            })
        );
    }

    #[test]
    fn test_server_reads_tag_one_as_auth() {
        let server = Dispatcher::for_role(Role::Server, ProtocolVersion::default());
        let msg = server.decode(1, b"Terraria49").unwrap().unwrap();
        assert_eq!(msg, Message::Auth(Auth { version: "Terraria49".into() }));
    }

    #[test]
    fn test_connection_approved_is_terminal_signal() {
        let mut sink = Recorder::default();
        let out = client().dispatch(3, Bytes::from_static(&[1]), &mut sink).unwrap();
        let Dispatched::Delivered(signal) = out else {
            panic!("expected delivery");
        };
        assert_eq!(signal, HandshakeSignal::Approved { slot: 1 });
        assert!(signal.is_terminal());
    }

    #[test]
    fn test_decode_error_delivers_nothing() {
        let mut sink = Recorder::default();
        let err = client()
            .dispatch(0x10, Bytes::from_static(&[1, 2]), &mut sink)
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(sink.messages.is_empty());
        assert!(sink.unknown.is_empty());
    }

    #[test]
    fn test_register_closure_codec() {
        let mut d = Dispatcher::new(Role::Client, ProtocolVersion::default());
        assert!(!d.is_registered(0x50));
        d.register(0x50, |payload: &[u8], _: &ProtocolVersion| -> Result<Message, ProtocolError> {
            Ok(Message::from(ConnectionApproved {
                player_slot: payload.len() as u8,
            }))
        });
        assert!(d.is_registered(0x50));
        let msg = d.decode(0x50, &[0, 0, 0]).unwrap().unwrap();
        assert_eq!(msg, Message::from(ConnectionApproved { player_slot: 3 }));
    }

    #[test]
    fn test_register_replaces_existing_codec() {
        let mut d = client();
        d.register_packet::<PlayerMana>();
        // Re-route 0x10 to the mana codec: same layout, different variant.
        d.register(tag::PLAYER_LIFE, TypedCodec::<PlayerMana>::new());
        let msg = d.decode(0x10, &[1, 100, 0, 200, 0]).unwrap().unwrap();
        assert!(matches!(msg, Message::PlayerMana(_)));
    }

    #[test]
    fn test_debug_lists_sorted_tags() {
        let text = format!("{:?}", client());
        assert!(text.contains("[1, 3, 4, 16, 42]"), "{text}");
    }
}
