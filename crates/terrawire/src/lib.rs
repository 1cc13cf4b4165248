//! # Terrawire
//!
//! Client-side engine for a length-prefixed binary game protocol in the
//! style of Terraria's multiplayer wire format.
//!
//! The work is split by layer:
//!
//! ```text
//! Application   ← MessageHandler / SessionEvent, SessionHandle::send
//!     ↕
//! Session       ← handshake, receive loop, serialized sends  (terrawire-session)
//!     ↕
//! Protocol      ← frames, typed messages, tag dispatch       (terrawire-protocol)
//!     ↕
//! Transport     ← TCP (or any AsyncRead + AsyncWrite)        (terrawire-transport)
//! ```
//!
//! This crate re-exports all three and adds [`connect`] for the common case.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use terrawire::prelude::*;
//!
//! # async fn run() -> Result<(), TerrawireError> {
//! let config = SessionConfig {
//!     protocol: ProtocolVersion::terraria37(),
//!     ..SessionConfig::default()
//! };
//! let mut session = terrawire::connect("127.0.0.1:7777", config).await?;
//! let Some(mut events) = session.events() else {
//!     return Ok(());
//! };
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Closed(reason) = event {
//!         println!("closed: {reason:?}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::TerrawireError;

pub use terrawire_protocol as protocol;
pub use terrawire_session as session;
pub use terrawire_transport as transport;

use terrawire_session::{ClientSession, SessionConfig};
use terrawire_transport::TcpTransport;

/// Default server address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:7777";

/// Connects over TCP with default transport settings and completes the
/// handshake.
///
/// The returned session is `Ready`. Events that arrived during the
/// handshake (including `ConnectionApproved` itself) are waiting in
/// [`ClientSession::events`].
pub async fn connect(addr: &str, config: SessionConfig) -> Result<ClientSession, TerrawireError> {
    let mut session = ClientSession::new(config);
    session.connect(&TcpTransport::new(), addr).await?;
    Ok(session)
}

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::{connect, TerrawireError, DEFAULT_ADDR};

    pub use terrawire_protocol::{
        Auth, Color, ColorLayout, ConnectionApproved, Dispatcher, FatalError, Gender,
        LengthConvention, Message, Packet, PlayerAppearance, PlayerColors, PlayerLife, PlayerMana,
        ProtocolError, ProtocolVersion, Role, StringEncoding,
    };
    pub use terrawire_session::{
        handler_fn, ClientSession, CloseReason, MessageHandler, SessionConfig, SessionError,
        SessionEvent, SessionHandle, SessionState,
    };
    pub use terrawire_transport::{TcpTransport, Transport, TransportError};
}
