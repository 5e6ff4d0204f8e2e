//! Session lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Handshake:
//!     PendingSession (handler + transport, no id)
//!     → handler acknowledges initialize
//!     → registry.rs admit (capacity check + insert, id minted)
//!     → Session (Active)
//!
//! Follow-up traffic:
//!     registry.rs touch → last_activity_at advances
//!
//! Teardown (first one wins):
//!     explicit terminate | transport close | sweeper.rs idle eviction
//!     → Session released (transport closed, handler closed) → Terminated
//! ```
//!
//! # Design Decisions
//! - One registry per process, passed explicitly; never a global
//! - Time comes from an injected Clock so expiry is testable
//! - Admission is a single critical section with no await inside
//! - Reject-new at capacity; existing sessions are never evicted to make room

pub mod clock;
pub mod registry;
pub mod session;
pub mod sweeper;

use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::SessionRegistry;
pub use session::{PendingSession, PushStream, Session, SessionId, SessionState, SessionTransport};
pub use sweeper::SweepTask;

/// Registry-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The registry already holds `max` sessions.
    #[error("Session capacity exceeded ({max} active sessions)")]
    CapacityExceeded { max: usize },

    /// Missing, unknown or expired session token.
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Termination requested for a session that does not exist.
    #[error("Session not found")]
    NotFound,
}
