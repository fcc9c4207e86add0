//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger (cancels a shared token) → server stops accepting
//!             → in-flight responses finish → store closes its pool → exit
//! ```
//!
//! # Design Decisions
//! - Background units left behind by timeouts are not awaited on exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
