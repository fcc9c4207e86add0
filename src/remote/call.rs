//! Cancellation-aware remote call.
//!
//! Waits on the remote reply and the deadline at the same time. If the
//! deadline wins, the local waiter returns `Canceled` at once and the abort
//! future is spawned to tell the remote side to stop. The abort is
//! best-effort: its failure is logged and counted, never returned.

use std::future::Future;

use crate::deadline::Deadline;
use crate::error::RequestError;
use crate::observability::metrics;
use crate::remote::StoreError;

/// Run `request` under `deadline`, sending `abort` out of band on cancel.
///
/// `abort` is only polled when cancellation wins; otherwise it is dropped
/// without ever running.
pub async fn execute<T, R, A>(deadline: &Deadline, request: R, abort: A) -> Result<T, StoreError>
where
    R: Future<Output = Result<T, StoreError>>,
    A: Future<Output = Result<(), StoreError>> + Send + 'static,
{
    if deadline.is_canceled() {
        return Err(StoreError::Canceled);
    }

    tokio::select! {
        biased;
        result = request => result,
        _ = deadline.canceled() => {
            tracing::info!(
                deadline_exceeded = deadline.deadline_exceeded(),
                "Remote call canceled, sending abort"
            );
            tokio::spawn(send_abort(abort));
            Err(StoreError::Canceled)
        }
    }
}

async fn send_abort<A>(abort: A)
where
    A: Future<Output = Result<(), StoreError>>,
{
    match abort.await {
        Ok(()) => {
            tracing::debug!("Remote abort delivered");
            metrics::record_abort("sent");
        }
        Err(e) => {
            let err = RequestError::from(e);
            tracing::warn!(error = %err, "Remote abort failed, ignoring");
            metrics::record_abort("failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_reply_before_deadline() {
        let root = Deadline::background();
        let (deadline, _guard) = root.derive(Duration::from_secs(2));
        let aborted = Arc::new(AtomicBool::new(false));
        let flag = aborted.clone();

        let result = execute(
            &deadline,
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(42)
            },
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        tokio::task::yield_now().await;
        assert!(!aborted.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unblocks_and_aborts() {
        let root = Deadline::background();
        let (deadline, _guard) = root.derive(Duration::from_secs(2));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let start = Instant::now();

        let result: Result<(), _> = execute(
            &deadline,
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            async move {
                let _ = tx.send(());
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(StoreError::Canceled)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
        assert!(rx.await.is_ok(), "abort must be sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_abort_does_not_fail_call() {
        let root = Deadline::background();
        let (deadline, _guard) = root.derive(Duration::from_millis(100));
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = execute(
            &deadline,
            std::future::pending(),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::AbortFailed("connection refused".into()))
            },
        )
        .await;

        assert!(matches!(result, Err(StoreError::Canceled)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "abort is never retried");
    }

    #[tokio::test]
    async fn test_remote_failure_is_not_cancellation() {
        let deadline = Deadline::background();
        let result: Result<(), _> = execute(
            &deadline,
            async { Err(StoreError::Remote("relation does not exist".into())) },
            async { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(StoreError::Remote(_))));
    }

    #[tokio::test]
    async fn test_already_canceled_skips_request() {
        let deadline = Deadline::background();
        deadline.cancel();
        let result: Result<(), _> = execute(
            &deadline,
            async { panic!("request must not be polled") },
            async { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(StoreError::Canceled)));
    }
}
