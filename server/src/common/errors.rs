//! Typed application errors, mapped onto the error taxonomy: storage errors are
//! distinguished as retryable or not so callers at the adapter boundary (job
//! store, outbox store) can decide whether to retry without inspecting strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Connection lost, pool exhausted, deadlock — safe to retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Invalid state transition, hierarchy cycle, duplicate idempotency key — never retried.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    AppError::ConstraintViolation(db_err.message().to_string())
                } else {
                    let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                    AppError::StorageUnavailable(format!("[{}] {}", code, db_err.message()))
                }
            }
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                AppError::StorageUnavailable(err.to_string())
            }
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

impl AppError {
    /// Whether an adapter-level caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_unavailable_is_retryable() {
        assert!(AppError::StorageUnavailable("x".into()).is_retryable());
    }

    #[test]
    fn constraint_violation_is_not_retryable() {
        assert!(!AppError::ConstraintViolation("x".into()).is_retryable());
    }
}
