//! Request-level error taxonomy.
//!
//! Every failure that can reach a caller is one of three kinds. A remote
//! abort failure is listed for completeness but is only ever logged.

use thiserror::Error;

/// Errors surfaced by deadline-governed operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The governing deadline expired or was explicitly canceled first.
    #[error("operation canceled before completion")]
    Canceled,

    /// The wrapped operation failed on its own, independent of timing.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// The out-of-band abort could not be delivered to the remote side.
    #[error("remote abort could not be delivered: {0}")]
    RemoteAbortFailed(String),
}

impl RequestError {
    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Canceled => "canceled",
            RequestError::OperationFailed(_) => "operation_failed",
            RequestError::RemoteAbortFailed(_) => "remote_abort_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RequestError::Canceled.to_string(),
            "operation canceled before completion"
        );
        let err = RequestError::OperationFailed("disk on fire".into());
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(err.kind(), "operation_failed");
    }
}
