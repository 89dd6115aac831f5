//! Database-specific error types and conversions.

use trustline_core::error::TrustlineError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflicting {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    #[error("Stored record is invalid: {0}")]
    InvalidRow(String),
}

impl From<DbError> for TrustlineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TrustlineError::NotFound { entity, id },
            DbError::Conflict { entity, detail } => TrustlineError::AlreadyExists { entity, detail },
            other => TrustlineError::Database(other.to_string()),
        }
    }
}
