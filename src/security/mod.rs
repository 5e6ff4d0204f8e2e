//! Security subsystem for the networked mode.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host_check.rs (Host / Origin allowlists)
//!     → rate_limit.rs (per-IP token bucket)
//!     → body size limit (tower-http)
//!     → session handling
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any failed check
//! - Empty allowlists allow everything

pub mod host_check;
pub mod rate_limit;

pub use host_check::{host_check_middleware, HostPolicy};
pub use rate_limit::{rate_limit_middleware, RateLimiterState};
