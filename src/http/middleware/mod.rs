//! Deadline and timeout middleware for axum routes.

pub mod deadline;
pub mod timeout;

pub use deadline::{derive_deadline, request_deadline, RequestDeadline};
pub use timeout::timeout_handler;
