//! Route handlers.
//!
//! Each handler is plain work. The deadline behavior comes from the
//! middleware wrapped around its route in `server.rs`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::http::middleware::RequestDeadline;
use crate::http::server::AppState;
use crate::work::blocking::{self, SlowHello};
use crate::work::LedgerSnapshot;

pub const SLOW_DB_STATEMENT: &str = "select pg_sleep(5)";
pub const SLOW_HELLO_DB_BODY: &str = "slow hello db\n";

pub async fn hello() -> &'static str {
    blocking::hello()
}

/// Five one-second waits. Never consults the deadline.
pub async fn slow_hello(RequestDeadline(deadline): RequestDeadline) -> &'static str {
    let body = SlowHello::default().run().await;
    if deadline.is_canceled() {
        tracing::debug!(
            deadline_exceeded = deadline.deadline_exceeded(),
            "Deadline canceled while working, responding anyway"
        );
    }
    body
}

pub async fn slow_hello_db(
    State(state): State<AppState>,
    RequestDeadline(deadline): RequestDeadline,
) -> Response {
    tracing::info!("slow hello db access");
    match state.store.query_one_cancellable(&deadline, SLOW_DB_STATEMENT).await {
        Ok(_) => SLOW_HELLO_DB_BODY.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "query failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => "ok\n".into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unreachable\n").into_response()
        }
    }
}

pub async fn work_stats(State(state): State<AppState>) -> Json<LedgerSnapshot> {
    Json(state.ledger.snapshot())
}
