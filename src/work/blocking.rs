//! Stand-in request work.
//!
//! `SlowHello::run` never looks at a deadline: it is the non-cooperative
//! operation that no wrapper can shorten. `run_cooperative` checks between
//! steps and gives up once the token is canceled.

use std::time::Duration;

use crate::deadline::Deadline;
use crate::error::RequestError;

pub const HELLO_BODY: &str = "hello\n";
pub const SLOW_HELLO_BODY: &str = "slow hello\n";

/// Immediate response.
pub fn hello() -> &'static str {
    tracing::info!("hello access");
    HELLO_BODY
}

/// A fixed sequence of sleeps.
#[derive(Debug, Clone, Copy)]
pub struct SlowHello {
    pub steps: u32,
    pub step: Duration,
}

impl Default for SlowHello {
    fn default() -> Self {
        Self {
            steps: 5,
            step: Duration::from_secs(1),
        }
    }
}

impl SlowHello {
    pub fn total(&self) -> Duration {
        self.step * self.steps
    }

    pub async fn run(&self) -> &'static str {
        tracing::info!("slow hello access");
        for i in 0..self.steps {
            tokio::time::sleep(self.step).await;
            tracing::debug!(step = i, "waiting");
        }
        SLOW_HELLO_BODY
    }

    pub async fn run_cooperative(&self, deadline: &Deadline) -> Result<&'static str, RequestError> {
        for i in 0..self.steps {
            tokio::select! {
                _ = tokio::time::sleep(self.step) => {
                    tracing::debug!(step = i, "waiting");
                }
                _ = deadline.canceled() => {
                    tracing::debug!(step = i, "deadline canceled, stopping early");
                    return Err(RequestError::Canceled);
                }
            }
        }
        Ok(SLOW_HELLO_BODY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_run_ignores_canceled_token() {
        let op = SlowHello::default();
        let deadline = Deadline::background();
        deadline.cancel();

        let start = Instant::now();
        assert_eq!(op.run().await, SLOW_HELLO_BODY);
        assert_eq!(start.elapsed(), op.total());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooperative_stops_on_cancel() {
        let op = SlowHello::default();
        let deadline = Deadline::background();
        deadline.cancel();

        assert_eq!(op.run_cooperative(&deadline).await, Err(RequestError::Canceled));
    }
}
