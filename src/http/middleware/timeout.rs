//! Racing timeout middleware.
//!
//! Runs the inner handler on its own task under a narrowed deadline and
//! answers `503` with the fallback body if the timer wins. The handler task
//! is left running; its response is dropped when it eventually arrives.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::deadline::{Deadline, Outcome, RacingTimeout};
use crate::error::RequestError;
use crate::observability::metrics;

pub async fn timeout_handler(
    State(racing): State<RacingTimeout>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let route = request.uri().path().to_owned();
    let parent = request
        .extensions()
        .get::<Deadline>()
        .cloned()
        .unwrap_or_else(Deadline::background);

    let outcome = racing
        .run(&parent, move |deadline| {
            request.extensions_mut().insert(deadline);
            async move { Ok::<_, RequestError>(next.run(request).await) }
        })
        .await;

    metrics::record_outcome(&route, outcome.label(), start);

    match outcome {
        Outcome::Success(response) => response,
        Outcome::Timeout { fallback } => {
            tracing::info!(route = %route, "Handler timed out, writing fallback");
            (StatusCode::SERVICE_UNAVAILABLE, fallback).into_response()
        }
        Outcome::Error(err) => {
            tracing::error!(route = %route, error = %err, "Handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
