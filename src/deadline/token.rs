//! Deadline and cancellation token.
//!
//! # Responsibilities
//! - Carry an optional absolute expiry and a one-shot cancellation signal
//! - Narrow an existing token into a child bounded by a duration
//! - Release the child's timer exactly once, on every exit path
//!
//! # Design Decisions
//! - Cancellation is cooperative: expiry flips a flag, it never stops a task
//! - Children are built on `CancellationToken::child_token`, so an ancestor's
//!   cancellation is visible to every descendant immediately
//! - The parent link is a `Weak` lookup reference, never ownership
//! - Each node records the first reason it was canceled; a node canceled
//!   through an ancestor inherits the ancestor's reason

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Expired,
    Canceled,
}

#[derive(Debug)]
struct Node {
    deadline_at: Option<Instant>,
    cancel: CancellationToken,
    cause: OnceLock<Cause>,
    parent: Option<Weak<Node>>,
}

impl Node {
    fn new(deadline_at: Option<Instant>, cancel: CancellationToken, parent: Option<Weak<Node>>) -> Self {
        Self {
            deadline_at,
            cancel,
            cause: OnceLock::new(),
            parent,
        }
    }

    /// Cancel, recording `cause` unless the node was already canceled.
    fn cancel_with(&self, cause: Cause) {
        if !self.cancel.is_cancelled() {
            let _ = self.cause.set(cause);
        }
        self.cancel.cancel();
    }

    fn cause(&self) -> Option<Cause> {
        self.cause.get().copied().or_else(|| {
            self.parent
                .as_ref()
                .and_then(Weak::upgrade)
                .and_then(|parent| parent.cause())
        })
    }

    fn effective_deadline(&self) -> Option<Instant> {
        let inherited = self
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|parent| parent.effective_deadline());

        match (self.deadline_at, inherited) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }
}

/// A propagatable deadline plus cancellation signal for one logical request.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Debug, Clone)]
pub struct Deadline {
    node: Arc<Node>,
}

impl Deadline {
    /// Root token: no deadline, no parent, never canceled unless asked to.
    pub fn background() -> Self {
        Self {
            node: Arc::new(Node::new(None, CancellationToken::new(), None)),
        }
    }

    /// Derive a child bounded by `duration` from now.
    ///
    /// The child is canceled when the tighter of its own and its ancestors'
    /// deadlines passes, when any ancestor is canceled, or when the returned
    /// guard is released. Must be called from within a Tokio runtime.
    pub fn derive(&self, duration: Duration) -> (Deadline, DeadlineGuard) {
        self.child(Some(Instant::now() + duration))
    }

    /// Derive a child with no deadline of its own, canceled only explicitly,
    /// through an ancestor, or when the guard is released.
    pub fn with_cancel(&self) -> (Deadline, DeadlineGuard) {
        self.child(None)
    }

    fn child(&self, deadline_at: Option<Instant>) -> (Deadline, DeadlineGuard) {
        let child = Deadline {
            node: Arc::new(Node::new(
                deadline_at,
                self.node.cancel.child_token(),
                Some(Arc::downgrade(&self.node)),
            )),
        };

        let timer = match child.effective_deadline() {
            Some(fire_at) if fire_at <= Instant::now() => {
                child.node.cancel_with(Cause::Expired);
                None
            }
            Some(fire_at) => Some(spawn_timer(&child.node, fire_at)),
            None => None,
        };

        let guard = DeadlineGuard {
            node: child.node.clone(),
            timer,
        };
        (child, guard)
    }

    /// The tighter of this token's own deadline and every live ancestor's.
    pub fn effective_deadline(&self) -> Option<Instant> {
        self.node.effective_deadline()
    }

    /// Time left until the effective deadline, `None` if there is none.
    pub fn remaining(&self) -> Option<Duration> {
        self.effective_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Flip this token (and all of its descendants) to canceled. Idempotent.
    pub fn cancel(&self) {
        self.node.cancel_with(Cause::Canceled);
    }

    pub fn is_canceled(&self) -> bool {
        self.node.cancel.is_cancelled()
    }

    /// True when the token was canceled because a deadline (its own or an
    /// ancestor's) passed, as opposed to an explicit cancel or a release.
    /// Decided by whichever happened first.
    pub fn deadline_exceeded(&self) -> bool {
        self.is_canceled() && self.node.cause() == Some(Cause::Expired)
    }

    /// Resolves once the token is canceled.
    pub async fn canceled(&self) {
        self.node.cancel.cancelled().await;
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::background()
    }
}

/// Free-standing form of [`Deadline::derive`].
pub fn derive(parent: &Deadline, duration: Duration) -> (Deadline, DeadlineGuard) {
    parent.derive(duration)
}

fn spawn_timer(node: &Arc<Node>, fire_at: Instant) -> JoinHandle<()> {
    let token = node.cancel.clone();
    let node = Arc::downgrade(node);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep_until(fire_at) => {
                tracing::debug!("Deadline expired, canceling token");
                match node.upgrade() {
                    Some(node) => node.cancel_with(Cause::Expired),
                    None => token.cancel(),
                }
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Releases a derived token's timer and cancels the token when dropped.
///
/// Drop runs exactly once whether the owning scope returns, errors, panics
/// or is itself dropped mid-await.
#[must_use = "dropping the guard releases the deadline immediately"]
#[derive(Debug)]
pub struct DeadlineGuard {
    node: Arc<Node>,
    timer: Option<JoinHandle<()>>,
}

impl DeadlineGuard {
    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.node.cancel_with(Cause::Canceled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_derived_token_cancels_at_deadline() {
        let root = Deadline::background();
        let start = Instant::now();
        let (child, _guard) = root.derive(Duration::from_secs(1));

        assert!(!child.is_canceled());
        child.canceled().await;

        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(child.deadline_exceeded());
        assert!(!root.is_canceled(), "expiry must not leak upwards");
    }

    #[tokio::test(start_paused = true)]
    async fn test_effective_deadline_is_tightest() {
        let root = Deadline::background();
        assert!(root.effective_deadline().is_none());

        let (parent, _pg) = root.derive(Duration::from_secs(1));
        let (child, _cg) = parent.derive(Duration::from_secs(5));

        assert_eq!(child.effective_deadline(), parent.effective_deadline());
        assert!(child.remaining().unwrap() <= Duration::from_secs(1));

        let start = Instant::now();
        child.canceled().await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_is_monotonic_and_propagates() {
        let root = Deadline::background();
        let (parent, _pg) = root.with_cancel();
        let (child, _cg) = parent.derive(Duration::from_secs(60));

        parent.cancel();
        parent.cancel();

        for _ in 0..100 {
            assert!(parent.is_canceled());
            assert!(child.is_canceled());
        }
        assert!(!child.deadline_exceeded());
        assert!(!root.is_canceled());
    }

    #[tokio::test]
    async fn test_guard_release_cancels() {
        let root = Deadline::background();
        let (child, guard) = root.derive(Duration::from_secs(60));
        assert!(!child.is_canceled());

        guard.release();
        assert!(child.is_canceled());
    }

    #[tokio::test]
    async fn test_guard_released_on_panic() {
        let root = Deadline::background();
        let (child, guard) = root.derive(Duration::from_secs(60));

        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });

        assert!(handle.await.is_err());
        assert!(child.is_canceled());
    }

    #[tokio::test]
    async fn test_already_expired_parent_cancels_child_immediately() {
        let root = Deadline::background();
        let (parent, _pg) = root.derive(Duration::ZERO);
        let (child, _cg) = parent.derive(Duration::from_secs(10));
        assert!(child.is_canceled());
        assert!(child.deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel_is_not_expiry_after_deadline_passes() {
        let root = Deadline::background();
        let (child, _guard) = root.derive(Duration::from_secs(1));

        child.cancel();
        assert!(!child.deadline_exceeded());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(child.is_canceled());
        assert!(!child.deadline_exceeded(), "the cancel came first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_not_expiry() {
        let root = Deadline::background();
        let (child, guard) = root.derive(Duration::from_secs(1));
        guard.release();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!child.deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_inherited_from_ancestor() {
        let root = Deadline::background();
        let (parent, _pg) = root.derive(Duration::from_secs(1));
        let (child, _cg) = parent.with_cancel();

        child.canceled().await;
        assert!(child.deadline_exceeded());
        assert!(parent.deadline_exceeded());

        let (request, _rg) = root.with_cancel();
        let (narrowed, _ng) = request.derive(Duration::from_secs(5));
        request.cancel();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!narrowed.deadline_exceeded(), "canceled through the request root");
    }
}
