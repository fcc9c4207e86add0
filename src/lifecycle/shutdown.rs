//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// A process-wide stop signal. Clones share the same signal, so the
/// signal handler and the server can each hold one.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `trigger` has been called on any clone.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
