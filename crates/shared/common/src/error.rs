//! Unified application error.
//!
//! Services return [`AppError`]; repository failures convert into it with `?`.

use repository::{ErrorKind, RepositoryError};
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    // Persistence
    #[error("Repository error: {0}")]
    Repository(#[source] RepositoryError),

    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Repository(err) => match err.kind() {
                ErrorKind::InvalidFilter => "INVALID_FILTER",
                _ => "REPOSITORY_ERROR",
            },
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict(msg) => {
                if msg.ends_with("already exists") {
                    msg.clone()
                } else {
                    format!("{} already exists", msg)
                }
            }

            AppError::Repository(e) => {
                tracing::error!("Repository error: {:?}", e);
                "A storage error occurred".to_string()
            }
            #[cfg(feature = "database")]
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }
}

// =============================================================================
// Repository Error Conversion
// =============================================================================

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound,
            _ if err.is_unique_violation() => AppError::conflict("Record"),
            _ => AppError::Repository(err),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}
