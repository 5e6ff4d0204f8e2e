//! Upstream provider subsystem.
//!
//! # Data Flow
//! ```text
//! invoke(method, params, target)
//!     → client.rs (target allowlist, endpoint URL, envelope with monotonic id)
//!     → HTTP POST to the provider
//!     → resilience/ (classify failure, retry with backoff or give up)
//!     → result value or RpcError
//! ```
//!
//! # Security Constraints
//! - The target is checked against the allowlist before any URL is built
//! - The API key only comes from the environment and is never logged
//! - Every attempt has a deadline

pub mod client;
pub mod types;

pub use client::RpcInvoker;
pub use types::{RequestEnvelope, RpcError, RpcResult};
