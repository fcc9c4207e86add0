//! Single-write result slot shared between a unit of work and its waiter.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
enum SlotState<T> {
    Empty,
    Filled(T),
    Taken,
    Abandoned,
}

/// What happened to a value written with [`ResultSlot::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Stored for the waiter to take.
    Stored,
    /// The waiter had already walked away; the value was dropped.
    Discarded,
    /// The slot had already been written once; the value was dropped.
    AlreadyWritten,
}

/// A slot written at most once by a unit of work and read at most once by
/// whoever is waiting on it.
#[derive(Debug)]
pub struct ResultSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Notify,
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            ready: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the result. Only the first write is kept.
    pub fn fill(&self, value: T) -> Fill {
        let mut state = self.state();
        match *state {
            SlotState::Empty => {
                *state = SlotState::Filled(value);
                drop(state);
                self.ready.notify_one();
                Fill::Stored
            }
            SlotState::Abandoned => Fill::Discarded,
            SlotState::Filled(_) | SlotState::Taken => Fill::AlreadyWritten,
        }
    }

    /// Take the value if it has been written and not yet taken.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state();
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Filled(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Wait until the value is written, then take it.
    ///
    /// Only one waiter is supported; the wake-up permit is not shared.
    pub async fn wait(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            self.ready.notified().await;
        }
    }

    /// Mark the slot as no longer awaited.
    ///
    /// Returns true if a value was already sitting in the slot and has now
    /// been dropped unread.
    pub fn abandon(&self) -> bool {
        let mut state = self.state();
        match std::mem::replace(&mut *state, SlotState::Abandoned) {
            SlotState::Filled(_) => true,
            SlotState::Taken => {
                *state = SlotState::Taken;
                false
            }
            SlotState::Empty | SlotState::Abandoned => false,
        }
    }

    /// True once a value has been written, whether or not anyone read it.
    pub fn is_written(&self) -> bool {
        matches!(*self.state(), SlotState::Filled(_) | SlotState::Taken)
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_first_write_wins() {
        let slot = ResultSlot::new();
        assert_eq!(slot.fill(1), Fill::Stored);
        assert_eq!(slot.fill(2), Fill::AlreadyWritten);
        assert_eq!(slot.take(), Some(1));
        assert_eq!(slot.take(), None);
        assert!(slot.is_written());
    }

    #[test]
    fn test_fill_after_abandon_is_discarded() {
        let slot = ResultSlot::new();
        assert!(!slot.abandon());
        assert_eq!(slot.fill("late"), Fill::Discarded);
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_abandon_drops_unread_value() {
        let slot = ResultSlot::new();
        slot.fill(7);
        assert!(slot.abandon());
        assert_eq!(slot.take(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_fill() {
        let slot = Arc::new(ResultSlot::new());
        let writer = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            writer.fill("done");
        });

        assert_eq!(slot.wait().await, "done");
    }
}
