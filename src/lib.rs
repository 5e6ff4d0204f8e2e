//! Session-aware JSON-RPC relay in front of a blockchain provider.

pub mod blockchain;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod security;
pub mod sessions;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
