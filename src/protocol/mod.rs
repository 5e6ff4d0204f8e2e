//! Inbound protocol handling.
//!
//! # Data Flow
//! ```text
//! JSON-RPC message (stdio line or HTTP body)
//!     → jsonrpc.rs (parse, shape checks)
//!     → handler.rs (per-session handler: initialize, ping, tools/*)
//!     → tools.rs (argument validation via validate.rs, upstream call)
//!     → format.rs (size-bounded text result)
//! ```
//!
//! # Design Decisions
//! - One handler instance per session; handlers share one RpcInvoker
//! - Tool arguments are validated before any upstream call
//! - Signing and state-changing methods are never relayed

pub mod format;
pub mod handler;
pub mod jsonrpc;
pub mod tools;
pub mod validate;

pub use handler::{HandlerError, HandlerFactory, McpHandler, McpHandlerFactory, SessionHandler};
pub use jsonrpc::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use tools::{RelayTools, ToolDescriptor, ToolDispatcher, ToolError};
