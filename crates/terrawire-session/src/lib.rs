//! # terrawire-session
//!
//! The client side of a Terrawire connection.
//!
//! A [`ClientSession`] opens a stream, runs the handshake, and then splits
//! the connection in two:
//!
//! - a **receive task** that reads frames, decodes them through the
//!   protocol's dispatcher, and emits [`SessionEvent`]s in wire order;
//! - any number of **senders** ([`SessionHandle::send`]) that write whole
//!   frames under a lock, from whatever task they run in.
//!
//! ## Handshake
//!
//! ```text
//!   client                         server
//!     │ ── Auth("Terraria49") ──────→ │
//!     │ ←──── ConnectionApproved(1) ─ │   connect() returns Ok(1)
//!     │                               │
//!     │ ←──── FatalError(...) ─────── │   connect() returns Err(Rejected)
//! ```
//!
//! Messages that arrive before the verdict are delivered like any other.
//! After the handshake, `FatalError` is delivered and then closes the
//! session; an unknown tag is reported and ignored.

mod client;
mod config;
mod error;
mod handler;
mod state;

pub use client::{ClientSession, SessionHandle};
pub use config::SessionConfig;
pub use error::SessionError;
pub use handler::{handler_fn, FnHandler, MessageHandler, SessionEvent};
pub use state::{CloseReason, SessionState};
