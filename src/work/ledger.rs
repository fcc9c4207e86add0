//! Accounting for spawned units of work.
//!
//! A unit whose result is delivered to its caller counts as `delivered`.
//! A unit that finishes after its caller already received a timeout counts
//! as `discarded`; until it finishes it is `orphaned`. Orphans are not
//! capped. The gauge exists so repeated timeouts are at least visible.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;

#[derive(Debug, Default)]
pub struct WorkLedger {
    spawned: AtomicU64,
    in_flight: AtomicU64,
    delivered: AtomicU64,
    orphaned: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time copy of the ledger counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub spawned: u64,
    pub in_flight: u64,
    pub delivered: u64,
    pub orphaned: u64,
    pub discarded: u64,
}

impl WorkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit_started(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unit_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// The caller received this unit's result.
    pub fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// The caller gave up on a unit that is still running.
    pub fn orphaned(&self) {
        let now = self.orphaned.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_background_units(now);
    }

    /// An orphaned unit finished; its result went nowhere.
    pub fn late_result(&self) {
        let now = self.orphaned.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        self.discarded.fetch_add(1, Ordering::Relaxed);
        metrics::set_background_units(now);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
