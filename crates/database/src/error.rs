//! Database error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A state transition was attempted from the wrong state.
    #[error("{entity} {id} is not {expected}")]
    InvalidState {
        entity: &'static str,
        id: String,
        expected: &'static str,
    },

    /// A stored value could not be decoded.
    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A write did not finish within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl DatabaseError {
    /// SQLite busy/locked conditions that clear up on their own.
    pub fn is_busy(&self) -> bool {
        match self {
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => {
                // SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes.
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                matches!(primary, Some(5) | Some(6))
                    || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }

    pub(crate) fn corrupt(entity: &'static str, reason: impl ToString) -> Self {
        DatabaseError::Corrupt {
            entity,
            reason: reason.to_string(),
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_busy() {
        assert!(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).is_busy());
        assert!(!DatabaseError::NotFound {
            entity: "Record",
            id: "x".into()
        }
        .is_busy());
    }
}
