//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures that are detectable without
/// touching storage (validation, malformed queries, hierarchy cycles) plus the
/// conflict/not-found outcomes stores report back through the repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed, missing or out-of-range entity attributes.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A `(tenant_id, code)` uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A filter, search or ordering referenced an unknown field.
    #[error("invalid query: {0}")]
    Query(String),

    /// Reparenting would create a cycle in a hierarchy.
    #[error("hierarchy cycle: {0}")]
    Cycle(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entity is absent or outside the caller's tenant scope.
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn cycle(msg: impl Into<String>) -> Self {
        Self::Cycle(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
