//! Session events and the handler interface that consumes them.
//!
//! Everything the receive loop learns goes through one channel of
//! [`SessionEvent`]s, in wire order. Applications either read that channel
//! directly ([`ClientSession::events`](crate::ClientSession::events)) or
//! hand a [`MessageHandler`] to
//! [`ClientSession::on_message`](crate::ClientSession::on_message), which
//! drives it from a task of its own.

use bytes::Bytes;
use terrawire_protocol::Message;
use tokio::sync::mpsc;

use crate::{CloseReason, SessionError};

/// Something that happened on the connection.
#[derive(Debug)]
pub enum SessionEvent {
    /// A decoded message.
    Message(Message),

    /// A frame whose tag has no registered codec. The session stays up.
    Unknown { tag: u8, payload: Bytes },

    /// A receive-side failure. Always followed by `Closed(Failed)`.
    Error(SessionError),

    /// The session closed. Always the last event.
    Closed(CloseReason),
}

// ---------------------------------------------------------------------------
// MessageHandler
// ---------------------------------------------------------------------------

/// Application callbacks for one session.
///
/// Only `on_message` is required. The others default to logging, so a
/// handler that only cares about messages stays a one-method impl.
///
/// Callbacks run one at a time on the handler task, never concurrently,
/// so `&mut self` state needs no locking. A slow callback delays later
/// events but never blocks the socket reader: events queue in between.
pub trait MessageHandler: Send + 'static {
    fn on_message(&mut self, message: Message);

    fn on_unknown(&mut self, tag: u8, payload: Bytes) {
        tracing::debug!(tag, len = payload.len(), "unhandled message tag");
    }

    fn on_error(&mut self, error: SessionError) {
        tracing::warn!(error = %error, "session error");
    }

    fn on_closed(&mut self, reason: CloseReason) {
        tracing::debug!(?reason, "session closed");
    }
}

/// A [`MessageHandler`] made from a closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps a closure as a [`MessageHandler`] that only handles messages.
///
/// ```rust
/// use terrawire_session::{handler_fn, MessageHandler};
/// use terrawire_protocol::{ConnectionApproved, Message};
///
/// let mut seen = 0;
/// let mut handler = handler_fn(move |_msg: Message| seen += 1);
/// handler.on_message(ConnectionApproved { player_slot: 1 }.into());
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(Message) + Send + 'static,
{
    FnHandler { f }
}

impl<F> MessageHandler for FnHandler<F>
where
    F: FnMut(Message) + Send + 'static,
{
    fn on_message(&mut self, message: Message) {
        (self.f)(message)
    }
}

/// Feeds events to `handler` until `Closed` (or until the channel ends),
/// then gives the handler back.
pub(crate) async fn drive<H: MessageHandler>(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut handler: H,
) -> H {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Message(message) => handler.on_message(message),
            SessionEvent::Unknown { tag, payload } => handler.on_unknown(tag, payload),
            SessionEvent::Error(error) => handler.on_error(error),
            SessionEvent::Closed(reason) => {
                handler.on_closed(reason);
                break;
            }
        }
    }
    handler
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrawire_protocol::{ConnectionApproved, PlayerLife};

    #[derive(Default)]
    struct Tally {
        messages: usize,
        unknown: Vec<u8>,
        errors: usize,
        closed: Option<CloseReason>,
    }

    impl MessageHandler for Tally {
        fn on_message(&mut self, _message: Message) {
            self.messages += 1;
        }
        fn on_unknown(&mut self, tag: u8, _payload: Bytes) {
            self.unknown.push(tag);
        }
        fn on_error(&mut self, _error: SessionError) {
            self.errors += 1;
        }
        fn on_closed(&mut self, reason: CloseReason) {
            self.closed = Some(reason);
        }
    }

    #[tokio::test]
    async fn test_drive_routes_each_event_kind() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Message(ConnectionApproved { player_slot: 1 }.into()))
            .unwrap();
        tx.send(SessionEvent::Unknown {
            tag: 0x77,
            payload: Bytes::new(),
        })
        .unwrap();
        tx.send(SessionEvent::Error(SessionError::NotConnected)).unwrap();
        tx.send(SessionEvent::Closed(CloseReason::Failed)).unwrap();

        let tally = drive(rx, Tally::default()).await;
        assert_eq!(tally.messages, 1);
        assert_eq!(tally.unknown, vec![0x77]);
        assert_eq!(tally.errors, 1);
        assert_eq!(tally.closed, Some(CloseReason::Failed));
    }

    #[tokio::test]
    async fn test_drive_stops_at_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Closed(CloseReason::EndOfStream)).unwrap();
        tx.send(SessionEvent::Message(ConnectionApproved { player_slot: 1 }.into()))
            .unwrap();

        let tally = drive(rx, Tally::default()).await;
        assert_eq!(tally.messages, 0, "nothing after Closed is delivered");
    }

    #[tokio::test]
    async fn test_drive_returns_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
        drop(tx);
        let tally = drive(rx, Tally::default()).await;
        assert!(tally.closed.is_none());
    }

    #[tokio::test]
    async fn test_handler_fn_sees_messages_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        for slot in 0..3 {
            tx.send(SessionEvent::Message(
                PlayerLife { slot, current: 1, max: 1 }.into(),
            ))
            .unwrap();
        }
        tx.send(SessionEvent::Closed(CloseReason::Disconnected)).unwrap();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        drive(
            rx,
            handler_fn(move |m: Message| {
                if let Message::PlayerLife(life) = m {
                    seen_tx.send(life.slot).unwrap();
                }
            }),
        )
        .await;

        let mut order = Vec::new();
        while let Ok(slot) = seen_rx.try_recv() {
            order.push(slot);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }
}
