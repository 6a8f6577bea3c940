use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::{Map, Value};

use bof_core::{BusinessObject, EntityId, OrderBy, Predicate, Snapshot};

use super::{duplicate_code_message, unique_key, EntityStore, StoreError, Window};

#[derive(Debug)]
struct Table<E> {
    rows: BTreeMap<EntityId, E>,
    next_id: i64,
}

/// In-memory entity store.
///
/// Intended for tests/dev. Predicates are evaluated against each row's JSON
/// form, so filtering and ordering behave the same way as in Postgres for
/// scalar fields.
#[derive(Debug)]
pub struct InMemoryEntityStore<E> {
    table: RwLock<Table<E>>,
}

impl<E> InMemoryEntityStore<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl<E: BusinessObject> InMemoryEntityStore<E> {
    fn matching(
        table: &Table<E>,
        predicate: &Predicate,
    ) -> Result<Vec<(Map<String, Value>, E)>, StoreError> {
        let mut out = Vec::new();
        for row in table.rows.values() {
            let object = Snapshot::capture(row)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
                .to_object();
            if predicate.matches(&object) {
                out.push((object, row.clone()));
            }
        }
        Ok(out)
    }

    fn code_taken(table: &Table<E>, row: &E, exclude: Option<EntityId>) -> bool {
        let Some(key) = unique_key(row) else {
            return false;
        };
        table
            .rows
            .values()
            .filter(|existing| Some(existing.id()) != exclude)
            .any(|existing| unique_key(existing) == Some(key))
    }
}

impl<E: BusinessObject> EntityStore<E> for InMemoryEntityStore<E> {
    fn insert(&self, mut rows: Vec<E>) -> Result<Vec<E>, StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // Check the whole batch before writing anything.
        for (index, row) in rows.iter().enumerate() {
            let duplicate_in_batch = unique_key(row)
                .is_some_and(|key| rows[..index].iter().any(|earlier| unique_key(earlier) == Some(key)));
            if duplicate_in_batch || Self::code_taken(&table, row, None) {
                return Err(StoreError::UniqueViolation {
                    index,
                    message: duplicate_code_message::<E>(row.code().unwrap_or_default()),
                });
            }
        }

        for row in &mut rows {
            let id = EntityId::new(table.next_id);
            table.next_id += 1;
            row.record_mut().id = id;
            table.rows.insert(id, row.clone());
        }

        Ok(rows)
    }

    fn replace(&self, row: &E) -> Result<(), StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let id = row.id();
        if !table.rows.contains_key(&id) {
            return Err(StoreError::Missing(id));
        }
        if Self::code_taken(&table, row, Some(id)) {
            return Err(StoreError::UniqueViolation {
                index: 0,
                message: duplicate_code_message::<E>(row.code().unwrap_or_default()),
            });
        }

        table.rows.insert(id, row.clone());
        Ok(())
    }

    fn find(&self, predicate: &Predicate, order: &OrderBy, window: Window) -> Result<Vec<E>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut rows = Self::matching(&table, predicate)?;
        rows.sort_by(|(a, _), (b, _)| order.compare(a, b));

        let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(rows.into_iter().skip(skip).take(limit).map(|(_, row)| row).collect())
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        Ok(Self::matching(&table, predicate)?.len() as u64)
    }
}
