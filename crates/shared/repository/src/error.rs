//! Repository error handling.
//!
//! The repository owns its error vocabulary: callers never see SeaORM's
//! not-found sentinels, only [`RepositoryError::NotFound`].

use std::fmt;

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Operation being performed when a repository call was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetAll,
    GetBatch,
    GetWhere,
    GetWhereBatch,
    GetByField,
    GetByFields,
    GetByFieldBatch,
    GetByFieldsBatch,
    GetOneByField,
    GetOneByFields,
    GetOneById,
    Count,
    Create,
    Save,
    Delete,
    /// Caller-composed query run through the scoped handle
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetAll => "get_all",
            Self::GetBatch => "get_batch",
            Self::GetWhere => "get_where",
            Self::GetWhereBatch => "get_where_batch",
            Self::GetByField => "get_by_field",
            Self::GetByFields => "get_by_fields",
            Self::GetByFieldBatch => "get_by_field_batch",
            Self::GetByFieldsBatch => "get_by_fields_batch",
            Self::GetOneByField => "get_one_by_field",
            Self::GetOneByFields => "get_one_by_fields",
            Self::GetOneById => "get_one_by_id",
            Self::Count => "count",
            Self::Create => "create",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Query => "query",
        };
        f.write_str(name)
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No row, or more than one row, where exactly one was expected
    NotFound,
    /// The store rejected or failed the operation
    StoreFailure,
    /// A filter referenced a field the entity does not have
    InvalidFilter,
    /// The repository was built with an option the entity cannot support
    InvalidConfiguration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::StoreFailure => write!(f, "store_failure"),
            Self::InvalidFilter => write!(f, "invalid_filter"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
        }
    }
}

/// Repository error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Unknown field `{field}` on {entity}")]
    UnknownField { entity: &'static str, field: String },

    #[error("Column `{column}` of {entity} cannot hold a soft-delete timestamp")]
    UnsupportedSoftDelete { entity: &'static str, column: String },

    #[error("Error during {operation}: {source}")]
    Store {
        operation: Operation,
        #[source]
        source: DbErr,
    },
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound => ErrorKind::NotFound,
            RepositoryError::UnknownField { .. } => ErrorKind::InvalidFilter,
            RepositoryError::UnsupportedSoftDelete { .. } => ErrorKind::InvalidConfiguration,
            RepositoryError::Store { .. } => ErrorKind::StoreFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound)
    }

    /// The underlying store error, if this is a store failure
    pub fn store_error(&self) -> Option<&DbErr> {
        match self {
            RepositoryError::Store { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the store rejected a write that broke a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self.store_error().and_then(DbErr::sql_err),
            Some(SqlErr::UniqueConstraintViolation(_))
        )
    }
}

/// Result type alias
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Whether a store error is one of SeaORM's "no such row" sentinels.
pub(crate) fn is_not_found_sentinel(err: &DbErr) -> bool {
    matches!(err, DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated)
}
