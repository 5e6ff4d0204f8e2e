//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream attempt fails:
//!     → classifier.rs (status / transport error → category + transience)
//!     → retries.rs (retry-or-give-up decision against the attempt budget)
//!     → backoff.rs (delay before the next attempt, Retry-After wins)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure, total function of the failure signal
//! - Retrying is an explicit state machine, not nested error handling
//! - Permanent failures are surfaced on first occurrence
//! - Protocol-level errors inside a 2xx body are never retried

pub mod backoff;
pub mod classifier;
pub mod retries;

pub use backoff::BackoffScheduler;
pub use classifier::{ClassifiedFailure, FailureCategory};
pub use retries::{RetryDecision, RetryState};
