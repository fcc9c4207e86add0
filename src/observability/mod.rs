//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! wrappers, handlers, remote store produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (outcome counters, leak and pool gauges)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is attached by tower-http and shows up in
//!   the trace layer's spans
//! - Metrics endpoint is optional and off by default

pub mod logging;
pub mod metrics;
