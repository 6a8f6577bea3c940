//! Business object model: shared record fields + the per-type contract.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DomainResult;
use crate::id::{EntityId, TenantId};

/// Field names every business object carries (see [`Record`]).
pub const RECORD_FIELDS: &[&str] = &["id", "tenant_id", "created_at", "updated_at", "is_active"];

/// Whether an entity type is isolated per tenant or shared across tenants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantScope {
    /// Rows belong to exactly one tenant; every query is filtered by it.
    Tenant,
    /// Rows are global (e.g. the company registry itself).
    Global,
}

/// Identity, tenant, timestamps and soft-delete flag.
///
/// Embedded by value (and flattened on the wire) in every entity type.
/// Storage owns these fields: `id` and the timestamps are assigned by the
/// repository/store, never taken from caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Record {
    /// Record for an entity that has not been persisted yet.
    pub fn pending() -> Self {
        Self {
            id: EntityId::UNASSIGNED,
            tenant_id: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            is_active: true,
        }
    }

    /// Stamp creation metadata (tenant + both timestamps).
    pub fn stamp_created(&mut self, tenant_id: Option<TenantId>, now: DateTime<Utc>) {
        self.tenant_id = tenant_id;
        self.created_at = now;
        self.updated_at = now;
        self.is_active = true;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::pending()
    }
}

/// Contract implemented by every persisted business object type.
///
/// Implementations are plain data + validation: `build` and `merge` must be
/// pure and reject invalid input with `DomainError::Validation`. Everything
/// touching storage lives in the repository.
pub trait BusinessObject:
    Clone + core::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Creation input. Never carries tenant or record fields.
    type Draft: Clone + core::fmt::Debug + Send + Sync;

    /// Partial update input; `Default` is the empty patch.
    type Patch: Clone + core::fmt::Debug + Default + Send + Sync;

    /// Stable type name used for storage partitioning and events
    /// (e.g. `"parties.partner"`).
    const ENTITY_TYPE: &'static str;

    const SCOPE: TenantScope = TenantScope::Tenant;

    /// Entity-specific field names usable in filters, search and ordering.
    const FIELDS: &'static [&'static str];

    /// Primary sort keys for default listings (`id` is always appended).
    const DEFAULT_ORDER: &'static [&'static str] = &["name"];

    /// Name of the unique code field, if the type has one.
    const CODE_FIELD: Option<&'static str> = None;

    /// Name of the self-referencing parent field, if the type is hierarchical.
    const PARENT_FIELD: Option<&'static str> = None;

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    /// Validate a draft into a not-yet-persisted entity.
    fn build(draft: Self::Draft) -> DomainResult<Self>;

    /// Apply a patch onto a copy of `self`, re-validating the merged result.
    fn merge(&self, patch: &Self::Patch) -> DomainResult<Self>;

    /// Normalized unique code, when present.
    fn code(&self) -> Option<&str> {
        None
    }

    /// Parent reference for hierarchical types.
    fn parent_id(&self) -> Option<EntityId> {
        None
    }

    /// Rows of other entity types this one points at, as `(field, id)`.
    /// The self-referencing parent is not listed here.
    fn references(&self) -> Vec<(&'static str, EntityId)> {
        Vec::new()
    }

    fn id(&self) -> EntityId {
        self.record().id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.record().tenant_id
    }

    fn is_active(&self) -> bool {
        self.record().is_active
    }

    /// Whether `name` is a record field or one of `FIELDS`.
    fn has_field(name: &str) -> bool {
        RECORD_FIELDS.contains(&name) || Self::FIELDS.contains(&name)
    }
}
