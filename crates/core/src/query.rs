//! Query building: caller filters + tenant scope -> validated predicate.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{BusinessObject, TenantScope};
use crate::error::{DomainError, DomainResult};
use crate::filter::{compare_values, FilterExpression, Filters};
use crate::id::{EntityId, TenantId};

/// A validated predicate for one entity type, ready for a store.
///
/// Only [`QueryBuilder`] constructs predicates, so every field referenced by
/// [`Predicate::expr`] is known to belong to the entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: FilterExpression,
}

impl Predicate {
    pub fn expr(&self) -> &FilterExpression {
        &self.expr
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.expr.matches(row)
    }
}

/// Builds the predicate for a list/count/get call.
///
/// Clauses, ANDed together:
/// 1. `tenant_id = <tenant>` unless the entity type is global
/// 2. `id = <id>` when targeting one row
/// 3. `is_active = true` unless inactive rows were requested or the caller
///    constrains `is_active` itself
/// 4. caller equality filters, search (ORed across fields) and expressions
#[derive(Debug, Clone)]
pub struct QueryBuilder<E> {
    tenant_id: TenantId,
    id: Option<EntityId>,
    filters: Filters,
    active_only: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: BusinessObject> QueryBuilder<E> {
    /// Listing semantics: active rows only by default.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            id: None,
            filters: Filters::default(),
            active_only: true,
            _entity: PhantomData,
        }
    }

    /// Single-row lookup semantics: inactive rows stay retrievable by id.
    pub fn by_id(tenant_id: TenantId, id: EntityId) -> Self {
        Self {
            id: Some(id),
            active_only: false,
            ..Self::new(tenant_id)
        }
    }

    pub fn filters(mut self, filters: &Filters) -> Self {
        self.filters.equals.extend(
            filters
                .equals
                .iter()
                .map(|(field, value)| (field.clone(), value.clone())),
        );
        if filters.search.is_some() {
            self.filters.search = filters.search.clone();
        }
        self.filters.expressions.extend(filters.expressions.iter().cloned());
        if filters.include_inactive {
            self.active_only = false;
        }
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }

    pub fn build(self) -> DomainResult<Predicate> {
        let mut clauses = Vec::new();

        if E::SCOPE == TenantScope::Tenant {
            clauses.push(FilterExpression::equals("tenant_id", self.tenant_id.get()));
        }

        if let Some(id) = self.id {
            clauses.push(FilterExpression::equals("id", id.get()));
        }

        if self.active_only && !self.filters.mentions_active_flag() {
            clauses.push(FilterExpression::equals("is_active", true));
        }

        for (field, value) in &self.filters.equals {
            ensure_field::<E>(field, "filter")?;
            clauses.push(FilterExpression::equals(field.clone(), value.clone()));
        }

        if let Some(search) = &self.filters.search {
            // Fields are checked even when the term is blank.
            for field in &search.fields {
                ensure_field::<E>(field, "search")?;
            }
            let term = search.term.trim();
            if !term.is_empty() {
                if search.fields.is_empty() {
                    return Err(DomainError::query("search requires at least one field"));
                }
                let any = search
                    .fields
                    .iter()
                    .map(|field| FilterExpression::contains(field.clone(), term))
                    .collect();
                clauses.push(FilterExpression::or(any));
            }
        }

        for expression in &self.filters.expressions {
            for field in expression.fields() {
                ensure_field::<E>(field, "filter")?;
            }
            clauses.push(expression.clone());
        }

        Ok(Predicate {
            expr: FilterExpression::and(clauses),
        })
    }
}

fn ensure_field<E: BusinessObject>(field: &str, context: &str) -> DomainResult<()> {
    if E::has_field(field) {
        Ok(())
    } else {
        Err(DomainError::query(format!(
            "unknown {context} field '{field}' for {}",
            E::ENTITY_TYPE
        )))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Ordering for list calls. Parsed from `"name,-created_at"` style strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBy(Vec<SortKey>);

impl OrderBy {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Validate against `E` and make the order total.
    ///
    /// An empty order falls back to `E::DEFAULT_ORDER`; `id ASC` is appended
    /// unless already present so rows sharing the primary keys still have a
    /// deterministic position.
    pub fn resolve<E: BusinessObject>(order: Option<&OrderBy>) -> DomainResult<OrderBy> {
        let mut keys: Vec<SortKey> = match order {
            Some(order) if !order.0.is_empty() => order.0.clone(),
            _ => E::DEFAULT_ORDER.iter().map(|f| SortKey::asc(*f)).collect(),
        };

        for key in &keys {
            ensure_field::<E>(&key.field, "order")?;
        }

        if !keys.iter().any(|k| k.field == "id") {
            keys.push(SortKey::asc("id"));
        }

        Ok(OrderBy(keys))
    }

    /// Compare two entity snapshots under this order.
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for key in &self.0 {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ord = match key.direction {
                Direction::Asc => compare_values(left, right),
                Direction::Desc => compare_values(right, left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl FromStr for OrderBy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut keys = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let key = match part.strip_prefix('-') {
                Some(field) => SortKey::desc(field.trim()),
                None => SortKey::asc(part.strip_prefix('+').unwrap_or(part).trim()),
            };
            if key.field.is_empty() {
                return Err(DomainError::query(format!("invalid order term '{part}'")));
            }
            keys.push(key);
        }
        Ok(OrderBy(keys))
    }
}
