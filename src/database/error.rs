//! Database error type shared by all repositories.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Row lookup that the caller expected to succeed.
    NotFound { entity: String, id: String },
    /// Unique constraint violation.
    UniqueViolation { constraint: String },
    /// Connection-level failure: pool exhausted, network, timeout.
    Connection { message: String },
    /// Caller-supplied input that violates a repository invariant.
    InvalidInput { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Connection { .. })
    }

    fn describe(&self) -> String {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueViolation { constraint } => {
                format!("unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::Connection { message } => {
                format!("database connection error: {}", message)
            }
            DatabaseErrorKind::InvalidInput { message } => {
                format!("invalid input: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => format!("database error: {}", message),
        }
    }
}
