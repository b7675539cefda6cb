//! Engine error types.

use taskhub_core::error::TaskhubError;
use thiserror::Error;

/// Failures raised by the engine before anything is written.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{0}")]
    Denied(String),

    #[error("{0}")]
    Blocked(String),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// The store failed while committing an authorized mutation.
    #[error("commit failed: {0}")]
    Commit(String),
}

impl AccessError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AccessError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<AccessError> for TaskhubError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied(reason) => TaskhubError::Forbidden { reason },
            AccessError::Blocked(reason) => TaskhubError::InvariantViolation { reason },
            AccessError::Invalid { .. } => TaskhubError::InvalidInput {
                message: err.to_string(),
            },
            AccessError::Commit(msg) => TaskhubError::Fatal(msg),
        }
    }
}

/// Map a store error raised while committing an authorized mutation.
///
/// Concurrency and existence outcomes, and the store's own invariant
/// backstops, are passed through unchanged; everything else is fatal.
pub(crate) fn commit_failure(err: TaskhubError) -> TaskhubError {
    match err {
        TaskhubError::Conflict { .. }
        | TaskhubError::NotFound { .. }
        | TaskhubError::InvariantViolation { .. } => err,
        other => AccessError::Commit(other.to_string()).into(),
    }
}
