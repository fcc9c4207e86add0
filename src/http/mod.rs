//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request ID, trace, root deadline)
//!     → middleware/ (derive_deadline inline, or timeout_handler racing)
//!     → handlers.rs (blocking work or cancellable store query)
//!     → exactly one response to the client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::RequestDeadline;
pub use server::{AppState, HttpServer};
