use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bof_core::changes::{diff, ChangeSet, Snapshot};
use bof_core::{EntityId, TenantId, UserId};

/// Lifecycle transition reported after a successful repository mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Updated,
    Deleted,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Created => "created",
            Operation::Updated => "updated",
            Operation::Deleted => "deleted",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entity an event is about and who caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubject {
    pub entity_type: String,
    pub entity_id: EntityId,
    /// `None` for global (tenant-less) entity types.
    pub tenant_id: Option<TenantId>,
    pub actor_user_id: Option<UserId>,
}

/// Audit/integration event for one entity mutation.
///
/// Events are facts: immutable once built, and carry both snapshots so
/// consumers never need to read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    #[serde(flatten)]
    pub subject: EventSubject,
    pub operation: Operation,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    /// Fields that differ between `before` and `after` (all populated fields
    /// for `created`).
    pub changes: ChangeSet,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(
        subject: EventSubject,
        operation: Operation,
        before: Option<Snapshot>,
        after: Option<Snapshot>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let empty = Snapshot::default();
        let changes = diff(
            before.as_ref().unwrap_or(&empty),
            after.as_ref().unwrap_or(&empty),
        );
        Self {
            event_id: Uuid::now_v7(),
            subject,
            operation,
            before,
            after,
            changes,
            occurred_at,
        }
    }

    /// Stable routing key, e.g. `"parties.partner.updated"`.
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.subject.entity_type, self.operation)
    }

    pub fn entity_id(&self) -> EntityId {
        self.subject.entity_id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.subject.tenant_id
    }
}
