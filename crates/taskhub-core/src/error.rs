//! Error types for the TaskHub system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskhubError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Optimistic-concurrency violation. The caller may re-read and retry.
    #[error("Conflict: {entity} with id {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    /// An authorized action blocked by a cross-role invariant
    /// (last Administrator, active tasks on group delete).
    #[error("Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// Audit-write or commit failure after authorization passed. The
    /// mutation has been rolled back.
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl TaskhubError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        TaskhubError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        TaskhubError::InvalidInput {
            message: message.into(),
        }
    }
}

pub type TaskhubResult<T> = Result<T, TaskhubError>;
