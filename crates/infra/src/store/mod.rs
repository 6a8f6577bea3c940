//! Persistence boundary for business objects.
//!
//! A store persists one entity type (`E::ENTITY_TYPE`) and evaluates
//! predicates built by `bof_core::QueryBuilder`. Stores know nothing about
//! validation, soft-delete policy or events; the repository owns those.
//!
//! Two implementations:
//! - [`InMemoryEntityStore`] for tests and development
//! - [`PostgresEntityStore`] backed by a single JSONB document table

use std::sync::Arc;

use thiserror::Error;

use bof_core::{BusinessObject, EntityId, OrderBy, PageRequest, Predicate, TenantId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryEntityStore;
pub use postgres::PostgresEntityStore;

/// Offset/limit window applied after ordering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Window {
    /// Every matching row.
    pub fn all() -> Self {
        Self { skip: 0, limit: None }
    }

    pub fn first(limit: u64) -> Self {
        Self {
            skip: 0,
            limit: Some(limit),
        }
    }
}

impl From<PageRequest> for Window {
    fn from(page: PageRequest) -> Self {
        Self {
            skip: page.skip,
            limit: Some(page.limit),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A `(tenant, code)` key is already taken. `index` is the position of
    /// the offending row in the submitted batch.
    #[error("unique constraint violated at batch index {index}: {message}")]
    UniqueViolation { index: usize, message: String },

    /// `replace` targeted a row that does not exist.
    #[error("row {0} does not exist")]
    Missing(EntityId),

    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be converted to or from its entity type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Storage for one business object type.
///
/// Implementations must:
/// - assign fresh, positive, never-reused ids on `insert`
/// - make `insert` all-or-nothing across the batch
/// - reject a non-null code already used by another row (active or not)
///   with the same tenant key (`None` for global types)
/// - apply `order` before `window`
pub trait EntityStore<E: BusinessObject>: Send + Sync {
    /// Persist new rows and return them with ids assigned, in input order.
    fn insert(&self, rows: Vec<E>) -> Result<Vec<E>, StoreError>;

    /// Overwrite the row with the same id.
    fn replace(&self, row: &E) -> Result<(), StoreError>;

    fn find(&self, predicate: &Predicate, order: &OrderBy, window: Window) -> Result<Vec<E>, StoreError>;

    fn count(&self, predicate: &Predicate) -> Result<u64, StoreError>;
}

impl<E, S> EntityStore<E> for Arc<S>
where
    E: BusinessObject,
    S: EntityStore<E> + ?Sized,
{
    fn insert(&self, rows: Vec<E>) -> Result<Vec<E>, StoreError> {
        (**self).insert(rows)
    }

    fn replace(&self, row: &E) -> Result<(), StoreError> {
        (**self).replace(row)
    }

    fn find(&self, predicate: &Predicate, order: &OrderBy, window: Window) -> Result<Vec<E>, StoreError> {
        (**self).find(predicate, order, window)
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, StoreError> {
        (**self).count(predicate)
    }
}

/// Uniqueness key of a row: `(tenant, code)` when the row carries a code.
pub(crate) fn unique_key<E: BusinessObject>(row: &E) -> Option<(Option<TenantId>, &str)> {
    row.code().map(|code| (row.tenant_id(), code))
}

pub(crate) fn duplicate_code_message<E: BusinessObject>(code: &str) -> String {
    format!("{} with code '{code}' already exists", E::ENTITY_TYPE)
}
