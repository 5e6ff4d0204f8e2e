//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr (stdout is reserved for the direct-pipe protocol)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (session_id, method, attempt, category) on every event
//! - Metrics are cheap facade calls; no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
