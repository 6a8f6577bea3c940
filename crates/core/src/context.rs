use crate::id::{TenantId, UserId};

/// Caller context for a repository call.
///
/// The tenant is derived by the caller from request context (never from a
/// request body). The actor is optional and only used for audit attribution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant_id: TenantId,
    actor: Option<UserId>,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }
}
