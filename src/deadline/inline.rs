//! Derived-deadline wrapper.
//!
//! Runs the operation on the caller's own task with a narrowed token. It can
//! only make cancellation observable; an operation that never checks the
//! token runs for as long as it wants.

use std::future::Future;
use std::time::Duration;

use crate::deadline::Deadline;

/// Derive a child of `parent` bounded by `duration`, run `op` inline with it,
/// and release the child on every exit path.
///
/// The operation's own output is returned untouched; this wrapper never
/// manufactures a cancellation error.
pub async fn with_deadline<T, F, Fut>(parent: &Deadline, duration: Duration, op: F) -> T
where
    F: FnOnce(Deadline) -> Fut,
    Fut: Future<Output = T>,
{
    let (child, _guard) = parent.derive(duration);
    op(child).await
}
