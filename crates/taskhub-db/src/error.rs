//! Database-specific error types and conversions.

use taskhub_core::error::TaskhubError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Version conflict on {entity} with id {id}")]
    Conflict { entity: String, id: String },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for TaskhubError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TaskhubError::NotFound { entity, id },
            DbError::Conflict { entity, id } => TaskhubError::Conflict { entity, id },
            DbError::Invariant(reason) => TaskhubError::InvariantViolation { reason },
            other => TaskhubError::Database(other.to_string()),
        }
    }
}
