//! Request deadline propagation and timeout enforcement.

pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod remote;
pub mod work;

pub use config::ServerConfig;
pub use deadline::{Deadline, Outcome, RacingTimeout};
pub use error::RequestError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
