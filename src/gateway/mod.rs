//! Transport gateway: the inbound side shared by both modes.
//!
//! # Data Flow
//! ```text
//! Direct-pipe mode:
//!     stdin line → jsonrpc::parse_message → dispatch.rs → stdout line
//!
//! Networked mode (see http/):
//!     HTTP request → session lookup/admission → dispatch.rs → HTTP response
//! ```
//!
//! # Design Decisions
//! - Both modes share one dispatch core so error mapping is identical
//! - A panicking handler yields an internal error, never a dead connection

pub mod dispatch;
pub mod stdio;

pub use dispatch::dispatch;
pub use stdio::run_stdio;
