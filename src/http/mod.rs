//! Networked mode: session-aware JSON-RPC over HTTP.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, security layers)
//!     → POST  /mcp: handshake or dispatch on an existing session
//!     → GET   /mcp: sse.rs push stream for an existing session
//!     → DELETE /mcp: explicit termination
//!     → response.rs (JSON-RPC bodies, status codes, session header)
//! ```

pub mod response;
pub mod server;
pub mod sse;

pub use server::{AppState, HttpServer};

/// Header carrying the session token in both directions.
pub const SESSION_HEADER: &str = "mcp-session-id";
