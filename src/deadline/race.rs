//! Racing timeout wrapper.
//!
//! Runs the operation on its own task and races its completion against a
//! timer. Whichever side is ready first decides the outcome. The losing
//! operation is never aborted: it keeps running, writes its result into a
//! slot nobody reads, and is counted as discarded in the ledger.
//!
//! Lateness is judged against this wrapper's own timer, never the token's
//! effective deadline: a tighter parent can cancel the operation early, but
//! only `duration` elapsing produces a timeout. A result produced at or after
//! the timer instant is late, so an exact tie goes to the timer, as does an
//! operation that returns because the expiry canceled it. A result produced
//! before it is delivered even if the waiter is polled after the timer is
//! ready.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::deadline::{Deadline, Outcome};
use crate::error::RequestError;
use crate::work::{Fill, ResultSlot, WorkLedger};

/// Decrements the in-flight count even if the unit panics.
struct InFlight(Arc<WorkLedger>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.unit_finished();
    }
}

struct Finished<T> {
    result: Result<T, RequestError>,
    on_time: bool,
}

#[derive(Debug, Clone)]
pub struct RacingTimeout {
    duration: Duration,
    fallback: String,
    ledger: Arc<WorkLedger>,
}

impl RacingTimeout {
    pub fn new(duration: Duration, fallback: impl Into<String>, ledger: Arc<WorkLedger>) -> Self {
        Self {
            duration,
            fallback: fallback.into(),
            ledger,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn ledger(&self) -> &Arc<WorkLedger> {
        &self.ledger
    }

    /// Race `op` against a timer of `self.duration`.
    pub async fn run<T, F, Fut>(&self, parent: &Deadline, op: F) -> Outcome<T>
    where
        F: FnOnce(Deadline) -> Fut,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
        T: Send + 'static,
    {
        let fires_at = Instant::now() + self.duration;
        let (token, guard) = parent.derive(self.duration);
        let timer = tokio::time::sleep_until(fires_at);
        let slot = Arc::new(ResultSlot::new());

        let work = op(token);
        let unit_slot = slot.clone();
        let in_flight = InFlight(self.ledger.clone());
        self.ledger.unit_started();

        tokio::spawn(async move {
            let _guard = guard;
            let result = work.await;
            let on_time = Instant::now() < fires_at;
            if unit_slot.fill(Finished { result, on_time }) == Fill::Discarded {
                tracing::debug!("Background unit finished after timeout, result discarded");
                in_flight.0.late_result();
            }
            drop(in_flight);
        });

        tokio::select! {
            biased;
            finished = slot.wait() => {
                if finished.on_time {
                    self.ledger.delivered();
                    return Outcome::from(finished.result);
                }
                self.ledger.orphaned();
                self.ledger.late_result();
            }
            _ = timer => {
                // Count the orphan before abandoning so a concurrent late
                // fill always finds it to settle.
                self.ledger.orphaned();
                if slot.abandon() {
                    self.ledger.late_result();
                }
            }
        }

        tracing::warn!(
            timeout_ms = self.duration.as_millis() as u64,
            "Operation timed out, delivering fallback"
        );
        Outcome::Timeout {
            fallback: self.fallback.clone(),
        }
    }
}
