//! Parent/child hierarchy validation.

use std::collections::HashSet;

use crate::error::DomainError;
use crate::id::EntityId;

/// Ensure that pointing `entity_id` at `new_parent` keeps the hierarchy acyclic.
///
/// Walks upwards from `new_parent`, asking `parent_of` for each ancestor's
/// parent (`Ok(None)` for a root or an unknown node). Fails with
/// `DomainError::Cycle` if the walk reaches `entity_id`, or if it revisits a
/// node (the stored hierarchy is already corrupt). The walk never mutates.
pub fn ensure_acyclic<F, Err>(
    entity_id: EntityId,
    new_parent: Option<EntityId>,
    mut parent_of: F,
) -> Result<(), Err>
where
    F: FnMut(EntityId) -> Result<Option<EntityId>, Err>,
    Err: From<DomainError>,
{
    let mut visited = HashSet::new();
    let mut current = new_parent;

    while let Some(ancestor) = current {
        if ancestor == entity_id {
            return Err(DomainError::cycle(format!(
                "entity {entity_id} cannot be placed under its own descendant"
            ))
            .into());
        }
        if !visited.insert(ancestor) {
            return Err(DomainError::cycle(format!(
                "existing hierarchy already loops through {ancestor}"
            ))
            .into());
        }
        current = parent_of(ancestor)?;
    }

    Ok(())
}
