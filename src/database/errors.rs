//! # Database Error Types

use thiserror::Error;

/// PostgreSQL SQLSTATE raised by `FOR UPDATE NOWAIT` on a locked row
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection broken")]
    ConnectionBroken,

    #[error("Could not connect to the database: {message}")]
    ConnectionUnavailable { message: String },

    #[error("{operation} failed: {message}")]
    Statement { operation: String, message: String },

    #[error("Data could not be {operation}: no rows affected")]
    NoRowsAffected { operation: String },

    #[error("Row lock not available: {message}")]
    LockNotAvailable { message: String },

    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn connection_unavailable(message: impl Into<String>) -> Self {
        Self::ConnectionUnavailable {
            message: message.into(),
        }
    }

    pub fn statement(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Statement {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn no_rows_affected(operation: impl Into<String>) -> Self {
        Self::NoRowsAffected {
            operation: operation.into(),
        }
    }

    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Translate a driver error raised while running `operation`
    pub fn from_sqlx(operation: &str, err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return Self::LockNotAvailable {
                    message: db_err.message().to_string(),
                };
            }
        }

        match err {
            sqlx::Error::Io(e) => Self::connection_unavailable(e.to_string()),
            sqlx::Error::Tls(e) => Self::connection_unavailable(e.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => Self::ConnectionBroken,
            other => Self::statement(operation, other.to_string()),
        }
    }

    pub fn is_connection_broken(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionBroken | DatabaseError::ConnectionUnavailable { .. }
        )
    }

    pub fn is_lock_not_available(&self) -> bool {
        matches!(self, DatabaseError::LockNotAvailable { .. })
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx("query", err)
    }
}

pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;
