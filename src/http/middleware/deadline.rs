//! Request-scoped deadlines.
//!
//! `request_deadline` gives every request a root token that is canceled once
//! the handler chain has produced its response. `derive_deadline` narrows it
//! for one route and runs the rest of the chain inline on the same task.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::time::Duration;

use crate::deadline::{with_deadline, Deadline};

/// Extracts the request's current [`Deadline`], or a background token if no
/// deadline middleware ran.
#[derive(Debug, Clone)]
pub struct RequestDeadline(pub Deadline);

impl<S> FromRequestParts<S> for RequestDeadline
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current(parts.extensions.get::<Deadline>())))
    }
}

fn current(found: Option<&Deadline>) -> Deadline {
    found.cloned().unwrap_or_else(Deadline::background)
}

/// Attach a root deadline that lives exactly as long as the handler chain.
pub async fn request_deadline(mut request: Request, next: Next) -> Response {
    let (root, _guard) = Deadline::background().with_cancel();
    request.extensions_mut().insert(root);
    next.run(request).await
}

/// Narrow the request's deadline to `duration` and run the handler inline.
///
/// A handler that never checks the token is not shortened; it only finds
/// the token canceled if it looks.
pub async fn derive_deadline(
    State(duration): State<Duration>,
    mut request: Request,
    next: Next,
) -> Response {
    let parent = current(request.extensions().get::<Deadline>());
    with_deadline(&parent, duration, |deadline| async move {
        request.extensions_mut().insert(deadline);
        next.run(request).await
    })
    .await
}
