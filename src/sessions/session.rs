//! Session state and the resources a session exclusively owns.
//!
//! # States
//! ```text
//! PendingHandshake → Active: handshake acknowledged, id minted
//! Active → Active: touch()
//! Active → Terminated: idle timeout | explicit terminate | transport close
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

use crate::protocol::handler::{HandlerError, SessionHandler};

/// Buffered server-pushed messages per stream.
const PUSH_BUFFER: usize = 64;

/// Opaque session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    PendingHandshake = 0,
    Active = 1,
    Terminated = 2,
}

impl From<u8> for SessionState {
    fn from(val: u8) -> Self {
        match val {
            1 => SessionState::Active,
            2 => SessionState::Terminated,
            _ => SessionState::PendingHandshake,
        }
    }
}

/// Receiving half of a push channel, handed to the streaming response.
#[derive(Debug)]
pub struct PushStream {
    /// Messages pushed by the server. Ends when the stream is replaced or closed.
    pub messages: mpsc::Receiver<Value>,
    /// Flips to `true` when the owning session is released.
    pub closed: watch::Receiver<bool>,
}

/// Transport handle owned by a session.
///
/// Holds at most one live push stream; attaching a new one ends the old.
#[derive(Debug)]
pub struct SessionTransport {
    stream: Mutex<Option<mpsc::Sender<Value>>>,
    closed: watch::Sender<bool>,
}

impl SessionTransport {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            stream: Mutex::new(None),
            closed,
        }
    }

    /// Open a push stream. Returns `None` once the transport is closed.
    pub fn attach_stream(&self) -> Option<PushStream> {
        if self.is_closed() {
            return None;
        }
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        let previous = self
            .stream
            .lock()
            .expect("session transport mutex poisoned")
            .replace(tx);
        if previous.is_some() {
            tracing::debug!("Replacing existing push stream");
        }
        Some(PushStream {
            messages: rx,
            closed: self.closed.subscribe(),
        })
    }

    /// Queue a message on the live stream. False if there is none or it is full.
    pub fn push(&self, message: Value) -> bool {
        let stream = self.stream.lock().expect("session transport mutex poisoned");
        match stream.as_ref() {
            Some(tx) => tx.try_send(message).is_ok(),
            None => false,
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream
            .lock()
            .expect("session transport mutex poisoned")
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Close the transport; any live stream ends.
    pub fn close(&self) {
        self.closed.send_replace(true);
        self.stream
            .lock()
            .expect("session transport mutex poisoned")
            .take();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for SessionTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// A handler/transport pair waiting for its handshake to be acknowledged.
pub struct PendingSession {
    handler: Arc<dyn SessionHandler>,
    transport: SessionTransport,
}

impl PendingSession {
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            handler,
            transport: SessionTransport::new(),
        }
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    pub fn state(&self) -> SessionState {
        SessionState::PendingHandshake
    }

    /// Bind an id and start the session's clock.
    pub(crate) fn activate(self, id: SessionId, now: Instant) -> Session {
        Session {
            id,
            created_at: now,
            last_activity_at: Mutex::new(now),
            state: AtomicU8::new(SessionState::Active as u8),
            transport: self.transport,
            handler: self.handler,
            dispatch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Release resources of a session that never became active.
    pub fn release(self) -> Result<(), HandlerError> {
        self.transport.close();
        self.handler.close()
    }
}

impl fmt::Debug for PendingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSession").finish_non_exhaustive()
    }
}

/// A live session.
pub struct Session {
    id: SessionId,
    created_at: Instant,
    last_activity_at: Mutex<Instant>,
    state: AtomicU8,
    transport: SessionTransport,
    handler: Arc<dyn SessionHandler>,
    dispatch_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity_at(&self) -> Instant {
        *self
            .last_activity_at
            .lock()
            .expect("session activity mutex poisoned")
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.state.load(Ordering::Acquire))
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    /// Lock held while dispatching when per-session ordering is enabled.
    pub fn dispatch_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.dispatch_lock
    }

    /// Record activity. The timestamp never moves backwards.
    pub fn touch(&self, now: Instant) {
        let mut last = self
            .last_activity_at
            .lock()
            .expect("session activity mutex poisoned");
        if now > *last {
            *last = now;
        }
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at())
    }

    /// Close the transport and the handler. Only the first call does work.
    pub(crate) fn release(&self) -> Result<(), HandlerError> {
        let previous = self
            .state
            .swap(SessionState::Terminated as u8, Ordering::AcqRel);
        if SessionState::from(previous) == SessionState::Terminated {
            return Ok(());
        }
        self.transport.close();
        self.handler.close()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
