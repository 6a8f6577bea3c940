//! `bof-core`: business object framework building blocks.
//!
//! This crate contains **pure** primitives shared by every service: entity
//! model, validation, filter/query building, pagination, change tracking and
//! hierarchy checks. No storage, no IO.

pub mod changes;
pub mod context;
pub mod entity;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod id;
pub mod page;
pub mod patch;
pub mod query;
pub mod validate;

pub use changes::{ChangeSet, FieldChange, Snapshot};
pub use context::RequestContext;
pub use entity::{BusinessObject, Record, TenantScope, RECORD_FIELDS};
pub use error::{DomainError, DomainResult};
pub use filter::{FilterExpression, Filters, Search};
pub use id::{EntityId, TenantId, UserId};
pub use page::{Page, PageRequest};
pub use query::{Direction, OrderBy, Predicate, QueryBuilder, SortKey};
