//! Terminal result delivered to a caller.

use crate::error::RequestError;

/// Exactly one of these is delivered per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    /// The timer won; `fallback` is the caller-supplied payload.
    Timeout { fallback: String },
    Error(RequestError),
}

impl<T> Outcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Timeout { .. } => "timeout",
            Outcome::Error(_) => "error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout { .. })
    }
}

impl<T> From<Result<T, RequestError>> for Outcome<T> {
    fn from(result: Result<T, RequestError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Error(err),
        }
    }
}
