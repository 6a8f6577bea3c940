//! Postgres-backed entity store.
//!
//! Every entity type shares one table, `business_objects`, partitioned by
//! `entity_type`. The full entity is stored as a JSONB document; the record
//! fields, code and parent are mirrored into columns for indexing and for the
//! uniqueness constraint.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / network / other | N/A | `Backend` |
//! | JSON decode of `doc` | N/A | `Corrupt` |
//!
//! ## Filtering and Ordering
//!
//! Predicates are rendered against the document (`doc -> 'field'`), so the
//! same field names work for record fields and entity fields. Ordering uses
//! JSONB comparison; values of a single JSON type order the same way as in
//! [`InMemoryEntityStore`](super::InMemoryEntityStore), while mixed-type
//! columns follow Postgres' JSONB type ordering.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder as SqlBuilder, Row};
use tokio::runtime::RuntimeFlavor;
use tracing::{instrument, Span};

use bof_core::{BusinessObject, Direction, EntityId, FilterExpression, OrderBy, Predicate};

use super::{duplicate_code_message, EntityStore, StoreError, Window};

/// DDL for the shared table. Safe to run repeatedly.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS business_objects (
    id          BIGSERIAL PRIMARY KEY,
    entity_type TEXT NOT NULL,
    tenant_id   BIGINT NULL,
    code        TEXT NULL,
    parent_id   BIGINT NULL,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    doc         JSONB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS business_objects_code_uq
    ON business_objects (entity_type, COALESCE(tenant_id, 0), code)
    WHERE code IS NOT NULL;
CREATE INDEX IF NOT EXISTS business_objects_scope_idx
    ON business_objects (entity_type, tenant_id, is_active);
CREATE INDEX IF NOT EXISTS business_objects_parent_idx
    ON business_objects (entity_type, tenant_id, parent_id)
    WHERE parent_id IS NOT NULL
"#;

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Postgres-backed store for one entity type.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync`. Clones share the
/// pool.
///
/// ## Sync Access
///
/// The [`EntityStore`] impl bridges to the async methods with
/// `tokio::task::block_in_place`, so it must be called from a multi-threaded
/// tokio runtime.
#[derive(Debug)]
pub struct PostgresEntityStore<E> {
    pool: Arc<PgPool>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PostgresEntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            _entity: PhantomData,
        }
    }
}

impl<E: BusinessObject> PostgresEntityStore<E> {
    pub fn new(pool: PgPool) -> Self {
        Self::from_shared(Arc::new(pool))
    }

    /// Build a store on a pool already shared with other entity types.
    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Create the table and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Insert a batch in one transaction, drawing ids from the table sequence.
    #[instrument(skip(self, rows), fields(entity_type = E::ENTITY_TYPE, row_count = rows.len()), err)]
    pub async fn insert_rows(&self, mut rows: Vec<E>) -> Result<Vec<E>, StoreError> {
        if rows.is_empty() {
            return Ok(rows);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for (index, row) in rows.iter_mut().enumerate() {
            let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('business_objects', 'id'))")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("next_id", e))?;
            row.record_mut().id = EntityId::new(id);

            let doc = serde_json::to_value(&*row).map_err(|e| StoreError::Corrupt(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO business_objects (
                    id,
                    entity_type,
                    tenant_id,
                    code,
                    parent_id,
                    is_active,
                    created_at,
                    updated_at,
                    doc
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(id)
            .bind(E::ENTITY_TYPE)
            .bind(row.tenant_id().map(|t| t.get()))
            .bind(row.code())
            .bind(row.parent_id().map(|p| p.get()))
            .bind(row.is_active())
            .bind(row.record().created_at)
            .bind(row.record().updated_at)
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::UniqueViolation {
                        index,
                        message: duplicate_code_message::<E>(row.code().unwrap_or_default()),
                    }
                } else {
                    map_sqlx_error("insert_row", e)
                }
            })?;
        }

        // Dropping `tx` on any early return above rolls the batch back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(rows)
    }

    #[instrument(skip(self, row), fields(entity_type = E::ENTITY_TYPE, id = %row.id()), err)]
    pub async fn replace_row(&self, row: &E) -> Result<(), StoreError> {
        let doc = serde_json::to_value(row).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE business_objects
            SET code = $1,
                parent_id = $2,
                is_active = $3,
                updated_at = $4,
                doc = $5
            WHERE entity_type = $6 AND id = $7
            "#,
        )
        .bind(row.code())
        .bind(row.parent_id().map(|p| p.get()))
        .bind(row.is_active())
        .bind(row.record().updated_at)
        .bind(&doc)
        .bind(E::ENTITY_TYPE)
        .bind(row.id().get())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation {
                    index: 0,
                    message: duplicate_code_message::<E>(row.code().unwrap_or_default()),
                }
            } else {
                map_sqlx_error("replace_row", e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(row.id()));
        }
        Ok(())
    }

    #[instrument(skip(self, predicate, order), fields(entity_type = E::ENTITY_TYPE, row_count = tracing::field::Empty), err)]
    pub async fn find_rows(
        &self,
        predicate: &Predicate,
        order: &OrderBy,
        window: Window,
    ) -> Result<Vec<E>, StoreError> {
        let mut qb = SqlBuilder::<Postgres>::new("SELECT doc FROM business_objects WHERE entity_type = ");
        qb.push_bind(E::ENTITY_TYPE);
        qb.push(" AND ");
        push_expression(&mut qb, predicate.expr());
        push_order(&mut qb, order);

        qb.push(" OFFSET ");
        qb.push_bind(to_i64(window.skip));
        if let Some(limit) = window.limit {
            qb.push(" LIMIT ");
            qb.push_bind(to_i64(limit));
        }

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_rows", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: serde_json::Value = row
                .try_get("doc")
                .map_err(|e| StoreError::Corrupt(format!("failed to read doc column: {e}")))?;
            let entity = serde_json::from_value(doc)
                .map_err(|e| StoreError::Corrupt(format!("failed to decode {}: {e}", E::ENTITY_TYPE)))?;
            out.push(entity);
        }

        Span::current().record("row_count", out.len());
        Ok(out)
    }

    #[instrument(skip(self, predicate), fields(entity_type = E::ENTITY_TYPE), err)]
    pub async fn count_rows(&self, predicate: &Predicate) -> Result<u64, StoreError> {
        let mut qb = SqlBuilder::<Postgres>::new("SELECT COUNT(*) FROM business_objects WHERE entity_type = ");
        qb.push_bind(E::ENTITY_TYPE);
        qb.push(" AND ");
        push_expression(&mut qb, predicate.expr());

        let total: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_rows", e))?;

        Ok(u64::try_from(total).unwrap_or_default())
    }
}

impl<E: BusinessObject> EntityStore<E> for PostgresEntityStore<E> {
    fn insert(&self, rows: Vec<E>) -> Result<Vec<E>, StoreError> {
        block_on(self.insert_rows(rows))?
    }

    fn replace(&self, row: &E) -> Result<(), StoreError> {
        block_on(self.replace_row(row))?
    }

    fn find(&self, predicate: &Predicate, order: &OrderBy, window: Window) -> Result<Vec<E>, StoreError> {
        block_on(self.find_rows(predicate, order, window))?
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, StoreError> {
        block_on(self.count_rows(predicate))?
    }
}

/// Run an async store call from the synchronous trait.
///
/// Only a multi-threaded runtime can park the calling worker; on a
/// current-thread runtime the connection IO would never be driven, so the
/// call is refused instead of blocking or panicking.
fn block_on<F: Future>(future: F) -> Result<F::Output, StoreError> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresEntityStore requires a tokio runtime; call it from within a multi-threaded runtime".to_string(),
        )
    })?;
    if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
        return Err(StoreError::Backend(
            "PostgresEntityStore cannot block a current-thread runtime; use a multi-threaded runtime".to_string(),
        ));
    }
    Ok(tokio::task::block_in_place(|| handle.block_on(future)))
}

fn push_expression(qb: &mut SqlBuilder<'_, Postgres>, expr: &FilterExpression) {
    match expr {
        FilterExpression::Equals { field, value } => {
            // Missing keys compare as JSON null.
            qb.push("COALESCE(doc -> ");
            qb.push_bind(field.clone());
            qb.push(", 'null'::jsonb) = ");
            qb.push_bind(value.clone());
        }
        FilterExpression::Contains { field, term } => {
            qb.push("(jsonb_typeof(doc -> ");
            qb.push_bind(field.clone());
            qb.push(") IN ('string', 'number', 'boolean') AND (doc ->> ");
            qb.push_bind(field.clone());
            qb.push(") ILIKE ");
            qb.push_bind(like_pattern(term));
            qb.push(")");
        }
        FilterExpression::And { all } => push_group(qb, all, " AND ", "TRUE"),
        FilterExpression::Or { any } => push_group(qb, any, " OR ", "FALSE"),
    }
}

fn push_group(qb: &mut SqlBuilder<'_, Postgres>, parts: &[FilterExpression], joiner: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_expression(qb, part);
    }
    qb.push(")");
}

fn push_order(qb: &mut SqlBuilder<'_, Postgres>, order: &OrderBy) {
    if order.keys().is_empty() {
        return;
    }
    qb.push(" ORDER BY ");
    for (i, key) in order.keys().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push("COALESCE(doc -> ");
        qb.push_bind(key.field.clone());
        qb.push(", 'null'::jsonb)");
        qb.push(match key.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }
}

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
