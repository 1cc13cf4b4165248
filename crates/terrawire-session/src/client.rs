//! The client session: handshake, receive loop, and serialized sends.
//!
//! A connected session is split in two halves that never wait on each
//! other:
//!
//! ```text
//!   SessionHandle::send ──lock──→ FrameWriter ──→ write half ─┐
//!                                                            socket
//!   receive task ←── FrameReader ←── read half ───────────────┘
//!        │
//!        └──→ SessionEvent channel ──→ events() / on_message(handler)
//! ```
//!
//! The write half sits behind an async mutex, so concurrent `send` calls
//! from any number of tasks each put one whole frame on the wire. The read
//! half belongs to the receive task alone. Shutdown goes through a
//! `watch` channel carrying [`SessionState`]: whoever moves the state to
//! `Closed` first wins, and the receive task notices the change even while
//! it is parked in a read.

use std::sync::{Arc, OnceLock};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use bytes::Bytes;
use terrawire_protocol::{
    Auth, DispatchSink, Dispatched, Dispatcher, FrameCodec, FrameReader, FrameWriter,
    HandshakeSignal, Message, PacketCodec, Role,
};
use terrawire_transport::Transport;

use crate::handler::{drive, MessageHandler, SessionEvent};
use crate::{CloseReason, SessionConfig, SessionError, SessionState};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by the session, its handles, and the receive task.
struct Shared {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    player_slot: OnceLock<u8>,
    writer: Mutex<Option<FrameWriter<BoxedWriter>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Moves to `next` unless the session is already closed.
    fn advance(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_closed() || *state == next {
                return false;
            }
            tracing::debug!(from = %state, to = %next, "session state change");
            *state = next;
            true
        })
    }

    /// Closes the session. Only the first call does anything; it returns
    /// `true` for that call and `false` for every later one.
    ///
    /// The state flips to `Closed` before anything is awaited, so a send
    /// racing with the close either finishes its frame or sees
    /// `NotConnected`, and the receive task wakes up and exits.
    async fn close(&self, reason: CloseReason) -> bool {
        let first = self.state.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            *state = SessionState::Closed;
            true
        });
        if !first {
            return false;
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "shutdown of write half failed");
            }
        }

        if reason.is_clean() {
            tracing::info!(?reason, "session closed");
        } else {
            tracing::warn!(?reason, "session closed");
        }
        let _ = self.events.send(SessionEvent::Closed(reason));
        true
    }

    /// Reports a receive-side error, then closes with `Failed`.
    async fn fail(&self, error: SessionError) {
        if self.state().is_closed() {
            return;
        }
        tracing::warn!(error = %error, "session failed");
        let _ = self.events.send(SessionEvent::Error(error));
        self.close(CloseReason::Failed).await;
    }

    /// Resolves once the state is `Closed`.
    async fn closed(rx: &mut watch::Receiver<SessionState>) {
        let _ = rx.wait_for(SessionState::is_closed).await;
    }
}

/// Forwards dispatcher output into the event channel.
struct EventSink<'a> {
    events: &'a mpsc::UnboundedSender<SessionEvent>,
}

impl DispatchSink for EventSink<'_> {
    fn message(&mut self, message: Message) {
        let _ = self.events.send(SessionEvent::Message(message));
    }

    fn unknown(&mut self, tag: u8, payload: Bytes) {
        let _ = self.events.send(SessionEvent::Unknown { tag, payload });
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A cheap, cloneable handle for sending on a session and watching it.
///
/// Handles can be moved into other tasks; every clone talks to the same
/// connection. A handle does not keep the connection open on its own:
/// dropping the [`ClientSession`] disconnects it.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The slot from `ConnectionApproved`, once the handshake is done.
    pub fn player_slot(&self) -> Option<u8> {
        self.shared.player_slot.get().copied()
    }

    /// Encodes `message` and writes it as one frame.
    ///
    /// Safe to call from many tasks at once: frames are written whole and
    /// never interleave. Permitted in any state that has a stream,
    /// including during the handshake.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] before `connect` or after close,
    ///   including when the session closes while this frame is still
    ///   being written.
    /// - [`SessionError::Protocol`] if the message can't be encoded (for
    ///   example a name too long for a fixed-width field) or the write
    ///   fails.
    pub async fn send(&self, message: impl Into<Message>) -> Result<(), SessionError> {
        let message = message.into();
        let state = self.state();
        if !state.has_stream() {
            if !state.is_closed() {
                tracing::warn!(message = message.name(), "send before the session connected");
            }
            return Err(SessionError::NotConnected);
        }

        let payload = message.encode(&self.shared.config.protocol)?;

        let mut state_rx = self.shared.state.subscribe();
        let mut guard = self.shared.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;

        // Give the lock up as soon as the session closes, even mid-frame;
        // `close` needs it to shut the stream down.
        tokio::select! {
            biased;
            _ = Shared::closed(&mut state_rx) => {
                tracing::debug!(message = message.name(), "send abandoned: session closed");
                return Err(SessionError::NotConnected);
            }
            written = writer.write_frame(message.tag(), &payload) => written?,
        }
        tracing::trace!(message = message.name(), len = payload.len(), "sent");
        Ok(())
    }

    /// Closes the connection and stops the receive loop.
    ///
    /// Idempotent: later calls, or calls after the server already closed,
    /// do nothing.
    pub async fn disconnect(&self) {
        self.shared.close(CloseReason::Disconnected).await;
    }

    /// Waits until the session is closed, for whatever reason.
    pub async fn wait_closed(&self) {
        Shared::closed(&mut self.shared.state.subscribe()).await;
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("player_slot", &self.player_slot())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// One client connection to a server.
///
/// ```rust,no_run
/// use terrawire_session::{handler_fn, ClientSession, SessionConfig};
/// use terrawire_transport::TcpTransport;
///
/// # async fn run() -> Result<(), terrawire_session::SessionError> {
/// let mut session = ClientSession::new(SessionConfig::default());
/// session.on_message(handler_fn(|msg| println!("{msg:?}")));
///
/// let slot = session.connect(&TcpTransport::new(), "127.0.0.1:7777").await?;
/// println!("joined as player {slot}");
///
/// session.handle().wait_closed().await;
/// # Ok(())
/// # }
/// ```
///
/// Sessions are single-use. Dropping a session that is still open
/// disconnects it.
pub struct ClientSession {
    handle: SessionHandle,
    dispatcher: Arc<Dispatcher>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    receive_task: Option<JoinHandle<()>>,
}

impl ClientSession {
    /// Creates a disconnected session that decodes the standard client
    /// message set.
    pub fn new(config: SessionConfig) -> Self {
        let dispatcher = Dispatcher::for_role(Role::Client, config.protocol.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Disconnected);

        Self {
            handle: SessionHandle {
                shared: Arc::new(Shared {
                    config,
                    state,
                    player_slot: OnceLock::new(),
                    writer: Mutex::new(None),
                    events: events_tx,
                }),
            },
            dispatcher: Arc::new(dispatcher),
            events: Some(events_rx),
            receive_task: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.handle.shared.config
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn player_slot(&self) -> Option<u8> {
        self.handle.player_slot()
    }

    /// Registers an extra codec, or replaces a standard one.
    ///
    /// # Errors
    /// [`SessionError::AlreadyStarted`] once `connect` has been called; the
    /// tag table is fixed for the life of the connection.
    pub fn register(&mut self, tag: u8, codec: impl PacketCodec) -> Result<(), SessionError> {
        if self.state() != SessionState::Disconnected {
            return Err(SessionError::AlreadyStarted);
        }
        Arc::get_mut(&mut self.dispatcher)
            .ok_or(SessionError::AlreadyStarted)?
            .register(tag, codec);
        Ok(())
    }

    /// Takes the event receiver.
    ///
    /// Returns `None` if it was already taken, by an earlier call or by
    /// [`on_message`](Self::on_message). Events queue from the moment the
    /// session is built, so taking the receiver after `connect` loses
    /// nothing.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    /// Spawns a task that feeds every event to `handler`.
    ///
    /// The task ends after `on_closed`, and its `JoinHandle` yields the
    /// handler back. Returns `None` if the event receiver was already
    /// taken.
    pub fn on_message<H: MessageHandler>(&mut self, handler: H) -> Option<JoinHandle<H>> {
        let events = self.events.take()?;
        Some(tokio::spawn(drive(events, handler)))
    }

    pub async fn send(&self, message: impl Into<Message>) -> Result<(), SessionError> {
        self.handle.send(message).await
    }

    pub async fn disconnect(&self) {
        self.handle.disconnect().await
    }

    /// Opens a stream through `transport` and runs the handshake.
    ///
    /// Returns the player slot from `ConnectionApproved`. On return the
    /// session is `Ready` and the receive loop is running.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyStarted`] if this session was connected
    ///   before.
    /// - [`SessionError::Transport`] if the stream can't be opened.
    /// - [`SessionError::Rejected`] if the server answers with `FatalError`.
    /// - [`SessionError::ClosedDuringHandshake`] if the stream ends first.
    /// - [`SessionError::HandshakeTimeout`] if the server never answers.
    ///
    /// Every error except `AlreadyStarted` leaves the session `Closed`.
    pub async fn connect<T: Transport>(
        &mut self,
        transport: &T,
        addr: &str,
    ) -> Result<u8, SessionError> {
        self.begin()?;
        tracing::info!(addr, version = %self.config().protocol.client_version, "connecting");

        let stream = match transport.connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.handle.shared.close(CloseReason::Failed).await;
                return Err(e.into());
            }
        };
        self.handshake(stream).await
    }

    /// Runs the handshake over an already-open stream.
    ///
    /// Same as [`connect`](Self::connect) minus the transport step. Handy
    /// for custom transports and for tests over in-memory pipes.
    pub async fn connect_stream<S>(&mut self, stream: S) -> Result<u8, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.begin()?;
        self.handshake(stream).await
    }

    /// `Disconnected` → `Connecting`, or `AlreadyStarted`.
    fn begin(&self) -> Result<(), SessionError> {
        let started = self.handle.shared.state.send_if_modified(|state| {
            if *state != SessionState::Disconnected {
                return false;
            }
            *state = SessionState::Connecting;
            true
        });
        if started {
            Ok(())
        } else {
            Err(SessionError::AlreadyStarted)
        }
    }

    async fn handshake<S>(&mut self, stream: S) -> Result<u8, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::clone(&self.handle.shared);
        let codec = FrameCodec::new(shared.config.protocol.length)
            .max_frame_len(shared.config.max_frame_len);

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(Box::new(read_half) as BoxedReader, codec);
        {
            let mut writer = shared.writer.lock().await;
            if shared.state().is_closed() {
                // disconnect() won the race while we were opening.
                return Err(SessionError::ClosedDuringHandshake);
            }
            *writer = Some(FrameWriter::new(Box::new(write_half) as BoxedWriter, codec));
        }
        shared.advance(SessionState::AwaitingHandshake);

        let auth = Auth {
            version: shared.config.protocol.client_version.clone(),
        };
        if let Err(e) = self.handle.send(auth).await {
            shared.close(CloseReason::Failed).await;
            return Err(e);
        }

        let wait = await_approval(&shared, &self.dispatcher, &mut reader);
        let outcome = match shared.config.handshake_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(?limit, "no answer to Auth");
                    shared.close(CloseReason::Failed).await;
                    Err(SessionError::HandshakeTimeout)
                }
            },
            None => wait.await,
        };
        let slot = outcome?;

        let _ = shared.player_slot.set(slot);
        if !shared.advance(SessionState::Ready) {
            return Err(SessionError::ClosedDuringHandshake);
        }
        tracing::info!(slot, "connection approved");

        self.receive_task = Some(tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.dispatcher),
            shared,
        )));
        Ok(slot)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if self.state().is_closed() {
            return;
        }
        let shared = Arc::clone(&self.handle.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    shared.close(CloseReason::Disconnected).await;
                });
            }
            Err(_) => {
                if let Some(task) = self.receive_task.take() {
                    task.abort();
                }
            }
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("state", &self.state())
            .field("player_slot", &self.player_slot())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Handshake and receive loop
// ---------------------------------------------------------------------------

/// Reads frames until the server approves or rejects us.
///
/// Anything else that arrives meanwhile is delivered as a normal event.
/// Every error path closes the session before returning.
async fn await_approval(
    shared: &Shared,
    dispatcher: &Dispatcher,
    reader: &mut FrameReader<BoxedReader>,
) -> Result<u8, SessionError> {
    let mut sink = EventSink {
        events: &shared.events,
    };
    let mut state_rx = shared.state.subscribe();

    loop {
        let read = tokio::select! {
            biased;
            _ = Shared::closed(&mut state_rx) => {
                return Err(SessionError::ClosedDuringHandshake);
            }
            read = reader.read_frame() => read,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                shared.close(CloseReason::EndOfStream).await;
                return Err(SessionError::ClosedDuringHandshake);
            }
            Err(e) => {
                shared.close(CloseReason::Failed).await;
                return Err(e.into());
            }
        };

        match dispatcher.dispatch(frame.tag, frame.payload, &mut sink) {
            Ok(Dispatched::Delivered(HandshakeSignal::Approved { slot })) => return Ok(slot),
            Ok(Dispatched::Delivered(HandshakeSignal::Fatal { offset, text })) => {
                shared
                    .close(CloseReason::Fatal {
                        offset,
                        text: text.clone(),
                    })
                    .await;
                return Err(SessionError::Rejected { offset, text });
            }
            Ok(_) => {}
            Err(e) => {
                shared.close(CloseReason::Failed).await;
                return Err(e.into());
            }
        }
    }
}

/// Owns the read half from `Ready` until close.
///
/// Exits on the first of: end of stream, `FatalError`, a read or decode
/// failure, or the state turning `Closed` from elsewhere.
async fn receive_loop(
    mut reader: FrameReader<BoxedReader>,
    dispatcher: Arc<Dispatcher>,
    shared: Arc<Shared>,
) {
    let mut sink = EventSink {
        events: &shared.events,
    };
    let mut state_rx = shared.state.subscribe();

    loop {
        let read = tokio::select! {
            biased;
            _ = Shared::closed(&mut state_rx) => {
                tracing::debug!("receive loop stopping: session closed");
                return;
            }
            read = reader.read_frame() => read,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                shared.close(CloseReason::EndOfStream).await;
                return;
            }
            Err(e) => {
                shared.fail(e.into()).await;
                return;
            }
        };

        match dispatcher.dispatch(frame.tag, frame.payload, &mut sink) {
            Ok(Dispatched::Delivered(HandshakeSignal::Fatal { offset, text })) => {
                shared.close(CloseReason::Fatal { offset, text }).await;
                return;
            }
            Ok(Dispatched::Delivered(HandshakeSignal::Approved { slot })) => {
                tracing::debug!(slot, "ConnectionApproved after handshake ignored");
            }
            Ok(_) => {}
            Err(e) => {
                shared.fail(e.into()).await;
                return;
            }
        }
    }
}
