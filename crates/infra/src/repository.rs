//! Generic repository: the only component that talks to a store.
//!
//! `Repository<E, S, P>` layers tenant scoping, validation, soft delete,
//! hierarchy checks and lifecycle events over an [`EntityStore`]. Stores and
//! sinks are injected at construction.
//!
//! Event publication happens after the store call succeeded. A failing sink
//! is logged and otherwise ignored; the mutation stands.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use bof_core::hierarchy::ensure_acyclic;
use bof_core::page::MAX_PAGE_SIZE;
use bof_core::validate::normalize_code;
use bof_core::{
    BusinessObject, DomainError, EntityId, Filters, OrderBy, Page, PageRequest, QueryBuilder, RequestContext,
    Snapshot, SortKey, TenantId, TenantScope,
};
use bof_events::{EventSink, EventSubject, LifecycleEvent, Operation};

use crate::error::{BulkFailure, RepositoryError, RepositoryResult};
use crate::store::{EntityStore, StoreError, Window};

/// Existence check for rows another entity type points at.
///
/// Implemented by every [`Repository`]; lookups run in the caller's tenant,
/// so a reference into another tenant reads as missing.
pub trait ReferenceTarget: Send + Sync {
    fn entity_type(&self) -> &'static str;

    fn exists(&self, ctx: &RequestContext, id: EntityId) -> RepositoryResult<bool>;
}

pub struct Repository<E, S, P> {
    store: S,
    sink: P,
    max_page_size: u64,
    references: HashMap<&'static str, Arc<dyn ReferenceTarget>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S, P> Repository<E, S, P>
where
    E: BusinessObject,
    S: EntityStore<E>,
    P: EventSink,
{
    pub fn new(store: S, sink: P) -> Self {
        Self {
            store,
            sink,
            max_page_size: MAX_PAGE_SIZE,
            references: HashMap::new(),
            _entity: PhantomData,
        }
    }

    /// Require ids in `field` (see [`BusinessObject::references`]) to exist
    /// in `target` on create, update and bulk create. Fields without a
    /// registered target are not checked.
    pub fn with_reference(mut self, field: &'static str, target: Arc<dyn ReferenceTarget>) -> Self {
        self.references.insert(field, target);
        self
    }

    /// Clamp every list/children page to at most `max` rows.
    pub fn with_max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id()), err)]
    pub fn create(&self, ctx: &RequestContext, draft: E::Draft) -> RepositoryResult<E> {
        let mut entity = E::build(draft)?;
        if let Some(parent) = entity.parent_id() {
            self.ensure_parent_exists(ctx, parent)?;
        }
        self.ensure_references_exist(ctx, &entity, None)?;
        entity.record_mut().stamp_created(self.owner(ctx), Utc::now());

        let created = self
            .store
            .insert(vec![entity])?
            .pop()
            .ok_or_else(|| StoreError::Backend("insert returned no rows".to_string()))?;

        debug!(id = %created.id(), "created");
        self.publish(ctx, Operation::Created, None, Some(&created));
        Ok(created)
    }

    /// Tenant-scoped lookup. Inactive rows are returned unless `extra`
    /// constrains `is_active`.
    pub fn get_by_id(&self, ctx: &RequestContext, id: EntityId, extra: &Filters) -> RepositoryResult<Option<E>> {
        let predicate = QueryBuilder::<E>::by_id(ctx.tenant_id(), id).filters(extra).build()?;
        let order = OrderBy::new(vec![SortKey::asc("id")]);
        Ok(self.store.find(&predicate, &order, Window::first(1))?.into_iter().next())
    }

    /// Like [`get_by_id`](Self::get_by_id) without extra filters, but absence
    /// is an error.
    pub fn fetch(&self, ctx: &RequestContext, id: EntityId) -> RepositoryResult<E> {
        self.get_by_id(ctx, id, &Filters::default())?
            .ok_or(RepositoryError::NotFound)
    }

    /// Active row with the given (normalized) code.
    pub fn get_by_code(&self, ctx: &RequestContext, code: &str) -> RepositoryResult<Option<E>> {
        let field = E::CODE_FIELD
            .ok_or_else(|| DomainError::query(format!("{} has no code field", E::ENTITY_TYPE)))?;
        let code = normalize_code(code)?;

        let predicate = QueryBuilder::<E>::new(ctx.tenant_id())
            .filters(&Filters::new().eq(field, code))
            .build()?;
        let order = OrderBy::new(vec![SortKey::asc("id")]);
        Ok(self.store.find(&predicate, &order, Window::first(1))?.into_iter().next())
    }

    /// One page of matching rows plus the total match count.
    ///
    /// The count runs as a second query over the same predicate, so
    /// `page.pages()` is consistent with `total` for fixed data.
    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id(), skip = page.skip, limit = page.limit), err)]
    pub fn list(
        &self,
        ctx: &RequestContext,
        filters: &Filters,
        page: PageRequest,
        order: Option<&OrderBy>,
    ) -> RepositoryResult<Page<E>> {
        let page = page.capped(self.max_page_size);
        let predicate = QueryBuilder::<E>::new(ctx.tenant_id()).filters(filters).build()?;
        let order = OrderBy::resolve::<E>(order)?;

        let items = self.store.find(&predicate, &order, page.into())?;
        let total = self.store.count(&predicate)?;
        Ok(Page::new(items, total, page))
    }

    pub fn count(&self, ctx: &RequestContext, filters: &Filters) -> RepositoryResult<u64> {
        let predicate = QueryBuilder::<E>::new(ctx.tenant_id()).filters(filters).build()?;
        Ok(self.store.count(&predicate)?)
    }

    /// Active direct children of `parent_id`, in default order.
    pub fn children(&self, ctx: &RequestContext, parent_id: EntityId, page: PageRequest) -> RepositoryResult<Page<E>> {
        let field = E::PARENT_FIELD
            .ok_or_else(|| DomainError::query(format!("{} is not hierarchical", E::ENTITY_TYPE)))?;
        self.list(ctx, &Filters::new().eq(field, parent_id.get()), page, None)
    }

    /// Merge `patch` onto the row and persist it.
    ///
    /// Returns `Ok(None)` when no row matches `id` + `extra` in the caller's
    /// tenant. Record fields are never taken from the patch.
    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id(), id = %id), err)]
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        patch: &E::Patch,
        extra: &Filters,
    ) -> RepositoryResult<Option<E>> {
        let Some(current) = self.get_by_id(ctx, id, extra)? else {
            return Ok(None);
        };

        let mut updated = current.merge(patch)?;
        *updated.record_mut() = current.record().clone();

        let new_parent = updated.parent_id();
        if new_parent != current.parent_id() {
            if let Some(parent) = new_parent {
                self.ensure_parent_exists(ctx, parent)?;
            }
            ensure_acyclic(id, new_parent, |node| self.parent_of(ctx, node))?;
        }
        self.ensure_references_exist(ctx, &updated, Some(&current))?;

        updated.record_mut().touch(Utc::now());
        self.store.replace(&updated)?;

        self.publish(ctx, Operation::Updated, Some(&current), Some(&updated));
        Ok(Some(updated))
    }

    /// Flip `is_active` to false. Returns whether a row matched.
    ///
    /// Deleting an already inactive row matches but writes nothing and emits
    /// no event.
    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id(), id = %id), err)]
    pub fn soft_delete(&self, ctx: &RequestContext, id: EntityId, extra: &Filters) -> RepositoryResult<bool> {
        let Some(current) = self.get_by_id(ctx, id, extra)? else {
            return Ok(false);
        };
        if !current.is_active() {
            return Ok(true);
        }

        let deleted = self.set_active(&current, false)?;
        self.publish(ctx, Operation::Deleted, Some(&current), Some(&deleted));
        Ok(true)
    }

    /// Reactivate a soft-deleted row. Returns whether a row matched.
    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id(), id = %id), err)]
    pub fn restore(&self, ctx: &RequestContext, id: EntityId) -> RepositoryResult<bool> {
        let Some(current) = self.get_by_id(ctx, id, &Filters::default())? else {
            return Ok(false);
        };
        if current.is_active() {
            return Ok(true);
        }

        let restored = self.set_active(&current, true)?;
        self.publish(ctx, Operation::Updated, Some(&current), Some(&restored));
        Ok(true)
    }

    /// Create every draft or none.
    ///
    /// All entries are checked before anything is written: validation,
    /// duplicate codes inside the batch, codes already taken in storage and
    /// missing parents. Every failing entry is reported in one
    /// [`RepositoryError::Bulk`]. The insert itself is a single atomic store
    /// call, so a uniqueness race at write time also rejects the whole batch.
    #[instrument(skip_all, fields(entity_type = E::ENTITY_TYPE, tenant_id = %ctx.tenant_id(), batch = drafts.len()), err)]
    pub fn bulk_create(&self, ctx: &RequestContext, drafts: Vec<E::Draft>) -> RepositoryResult<Vec<E>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let owner = self.owner(ctx);
        let mut failures = Vec::new();
        let mut seen_codes: HashMap<String, usize> = HashMap::new();
        let mut entities = Vec::with_capacity(drafts.len());

        for (index, draft) in drafts.into_iter().enumerate() {
            let mut entity = match E::build(draft) {
                Ok(entity) => entity,
                Err(err) => {
                    failures.push(BulkFailure::new(index, err));
                    continue;
                }
            };

            if let Some(code) = entity.code() {
                if let Some(first) = seen_codes.get(code) {
                    failures.push(BulkFailure::new(
                        index,
                        DomainError::conflict(format!("code '{code}' repeats batch entry {first}")),
                    ));
                    continue;
                }
                seen_codes.insert(code.to_string(), index);

                if self.code_taken(ctx, code)? {
                    failures.push(BulkFailure::new(
                        index,
                        DomainError::conflict(format!("{} with code '{code}' already exists", E::ENTITY_TYPE)),
                    ));
                    continue;
                }
            }

            if let Some(parent) = entity.parent_id() {
                if let Err(err) = self.ensure_parent_exists(ctx, parent) {
                    match err {
                        RepositoryError::Validation(msg) => {
                            failures.push(BulkFailure::new(index, DomainError::Validation(msg)));
                            continue;
                        }
                        other => return Err(other),
                    }
                }
            }

            match self.ensure_references_exist(ctx, &entity, None) {
                Ok(()) => {}
                Err(RepositoryError::Validation(msg)) => {
                    failures.push(BulkFailure::new(index, DomainError::Validation(msg)));
                    continue;
                }
                Err(other) => return Err(other),
            }

            entity.record_mut().stamp_created(owner, now);
            entities.push(entity);
        }

        if !failures.is_empty() {
            return Err(RepositoryError::Bulk(failures));
        }

        // No failures, so batch positions equal draft positions.
        let created = match self.store.insert(entities) {
            Ok(rows) => rows,
            Err(StoreError::UniqueViolation { index, message }) => {
                return Err(RepositoryError::Bulk(vec![BulkFailure::new(
                    index,
                    DomainError::Conflict(message),
                )]));
            }
            Err(err) => return Err(err.into()),
        };

        for entity in &created {
            self.publish(ctx, Operation::Created, None, Some(entity));
        }
        Ok(created)
    }

    /// Tenant assigned to new rows.
    fn owner(&self, ctx: &RequestContext) -> Option<TenantId> {
        match E::SCOPE {
            TenantScope::Tenant => Some(ctx.tenant_id()),
            TenantScope::Global => None,
        }
    }

    fn set_active(&self, current: &E, active: bool) -> RepositoryResult<E> {
        let mut next = current.clone();
        let record = next.record_mut();
        record.is_active = active;
        record.touch(Utc::now());
        self.store.replace(&next)?;
        Ok(next)
    }

    fn parent_of(&self, ctx: &RequestContext, node: EntityId) -> RepositoryResult<Option<EntityId>> {
        Ok(self
            .get_by_id(ctx, node, &Filters::default())?
            .and_then(|entity| entity.parent_id()))
    }

    fn ensure_parent_exists(&self, ctx: &RequestContext, parent: EntityId) -> RepositoryResult<()> {
        match self.get_by_id(ctx, parent, &Filters::default())? {
            Some(_) => Ok(()),
            None => Err(RepositoryError::Validation(format!(
                "parent {parent} does not exist for {}",
                E::ENTITY_TYPE
            ))),
        }
    }

    /// Check registered references of `entity`. On update, ids already held
    /// by `current` are not re-checked.
    fn ensure_references_exist(&self, ctx: &RequestContext, entity: &E, current: Option<&E>) -> RepositoryResult<()> {
        if self.references.is_empty() {
            return Ok(());
        }
        let unchanged = current.map(|c| c.references()).unwrap_or_default();

        for (field, id) in entity.references() {
            if unchanged.contains(&(field, id)) {
                continue;
            }
            let Some(target) = self.references.get(field) else {
                continue;
            };
            if !target.exists(ctx, id)? {
                return Err(RepositoryError::Validation(format!(
                    "{field} {id} does not exist for {}",
                    E::ENTITY_TYPE
                )));
            }
        }
        Ok(())
    }

    /// Whether any row in scope, active or not, holds `code`.
    fn code_taken(&self, ctx: &RequestContext, code: &str) -> RepositoryResult<bool> {
        let Some(field) = E::CODE_FIELD else {
            return Ok(false);
        };
        let predicate = QueryBuilder::<E>::new(ctx.tenant_id())
            .include_inactive()
            .filters(&Filters::new().eq(field, code))
            .build()?;
        Ok(self.store.count(&predicate)? > 0)
    }

    fn publish(&self, ctx: &RequestContext, operation: Operation, before: Option<&E>, after: Option<&E>) {
        let Some(entity) = after.or(before) else {
            return;
        };

        let snapshots = before
            .map(Snapshot::capture)
            .transpose()
            .and_then(|b| after.map(Snapshot::capture).transpose().map(|a| (b, a)));
        let (before, after) = match snapshots {
            Ok(pair) => pair,
            Err(err) => {
                warn!(entity_type = E::ENTITY_TYPE, id = %entity.id(), error = %err, "failed to snapshot entity; event dropped");
                return;
            }
        };

        let subject = EventSubject {
            entity_type: E::ENTITY_TYPE.to_string(),
            entity_id: entity.id(),
            tenant_id: entity.tenant_id(),
            actor_user_id: ctx.actor(),
        };
        let event = LifecycleEvent::new(subject, operation, before, after, Utc::now());

        if let Err(err) = self.sink.publish(event) {
            warn!(
                entity_type = E::ENTITY_TYPE,
                id = %entity.id(),
                operation = %operation,
                error = ?err,
                "event publication failed; mutation kept"
            );
        }
    }
}

impl<E, S, P> ReferenceTarget for Repository<E, S, P>
where
    E: BusinessObject,
    S: EntityStore<E>,
    P: EventSink,
{
    fn entity_type(&self) -> &'static str {
        E::ENTITY_TYPE
    }

    fn exists(&self, ctx: &RequestContext, id: EntityId) -> RepositoryResult<bool> {
        Ok(self.get_by_id(ctx, id, &Filters::default())?.is_some())
    }
}

impl<E, S, P> std::fmt::Debug for Repository<E, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let references: HashMap<&str, &str> = self
            .references
            .iter()
            .map(|(field, target)| (*field, target.entity_type()))
            .collect();
        f.debug_struct("Repository")
            .field("entity_type", &std::any::type_name::<E>())
            .field("max_page_size", &self.max_page_size)
            .field("references", &references)
            .finish_non_exhaustive()
    }
}
