use std::fmt;

use thiserror::Error;

use bof_core::DomainError;

use crate::store::StoreError;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// One rejected entry of a bulk create, by position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub index: usize,
    pub error: DomainError,
}

impl BulkFailure {
    pub fn new(index: usize, error: DomainError) -> Self {
        Self { index, error }
    }
}

impl fmt::Display for BulkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {}: {}", self.index, self.error)
    }
}

/// Errors surfaced by [`Repository`](crate::repository::Repository).
///
/// Absence is not an error for lookups and mutations by id: those return
/// `Ok(None)` / `Ok(false)`. `NotFound` is only produced by
/// [`Repository::fetch`](crate::repository::Repository::fetch).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("hierarchy cycle: {0}")]
    Cycle(String),

    /// Bulk create rejected; nothing was persisted.
    #[error("bulk create rejected ({} failing entries)", .0.len())]
    Bulk(Vec<BulkFailure>),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for RepositoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Query(msg) => Self::Query(msg),
            DomainError::Cycle(msg) => Self::Cycle(msg),
            DomainError::NotFound => Self::NotFound,
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation { message, .. } => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}
