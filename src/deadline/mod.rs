//! Deadline propagation subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → token.rs (root Deadline per request)
//!     → inline.rs (narrow the token, run on the caller's task)
//!       or race.rs (narrow the token, run on a spawned task, race a timer)
//!     → operation (in-process work, or a remote call that can be aborted)
//!     → outcome.rs (exactly one Outcome back to the caller)
//! ```
//!
//! # Design Decisions
//! - Expiry never stops a task; it only flips the token
//! - Release of a derived token is tied to a guard's Drop
//! - The racing wrapper bounds caller latency, not total work

pub mod inline;
pub mod outcome;
pub mod race;
pub mod token;

pub use inline::with_deadline;
pub use outcome::Outcome;
pub use race::RacingTimeout;
pub use token::{derive, Deadline, DeadlineGuard};
