//! Units of work and their bookkeeping.
//!
//! # Data Flow
//! ```text
//! wrapper spawns unit
//!     → ledger.rs (spawned / in_flight)
//!     → unit runs blocking.rs work, writes into slot.rs
//!     → waiter takes the value (delivered)
//!       or has already left (orphaned → discarded)
//! ```

pub mod blocking;
pub mod ledger;
pub mod slot;

pub use blocking::SlowHello;
pub use ledger::{LedgerSnapshot, WorkLedger};
pub use slot::{Fill, ResultSlot};
