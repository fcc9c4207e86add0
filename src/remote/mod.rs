//! Remote store subsystem.
//!
//! # Data Flow
//! ```text
//! handler (with request Deadline)
//!     → store.rs (Store trait: query_one_cancellable, ...)
//!     → pool.rs (bounded checkout, waits on the deadline)
//!     → call.rs (race the remote reply against cancellation)
//!         → reply first: rows back to the handler
//!         → canceled first: Canceled back, abort sent out of band
//!     → postgres.rs (tokio-postgres connection + CancelToken)
//! ```
//!
//! # Design Decisions
//! - The store is an explicit trait; backends implement it by name
//! - Abort is fire-and-forget: a failed abort is logged, never retried
//! - A connection whose query was canceled is not reused

use thiserror::Error;

use crate::error::RequestError;

pub mod call;
pub mod pool;
pub mod postgres;
pub mod store;

pub use pool::{Manager, Pool, PoolBounds, PoolState, PooledConnection};
pub use postgres::PgStore;
pub use store::{Row, Store, Transaction};

/// Errors raised by the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The governing deadline fired while waiting.
    #[error("remote call canceled")]
    Canceled,

    #[error("connect failed: {0}")]
    Connect(#[source] tokio_postgres::Error),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("query returned no rows")]
    NoRows,

    /// Remote-side failure reported by a non-Postgres backend.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("abort notification failed: {0}")]
    AbortFailed(String),
}

impl From<StoreError> for RequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Canceled => RequestError::Canceled,
            StoreError::AbortFailed(msg) => RequestError::RemoteAbortFailed(msg),
            other => RequestError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(RequestError::from(StoreError::Canceled), RequestError::Canceled);
        assert_eq!(
            RequestError::from(StoreError::AbortFailed("refused".into())),
            RequestError::RemoteAbortFailed("refused".into())
        );
        assert_eq!(
            RequestError::from(StoreError::NoRows),
            RequestError::OperationFailed("query returned no rows".into())
        );
    }
}
