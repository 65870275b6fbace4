//! Postgres-backed catalog + stock store.
//!
//! Stock mutations are single conditional `UPDATE` statements, so the
//! check-and-decrement is atomic in the database and holds across any number
//! of service instances without a shared lock manager. When the guard matches
//! no row, the outcome is decided again under `SELECT ... FOR UPDATE`, so a
//! rejection always reports the level it was checked against.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `23505` unique violation | `Conflict` | duplicate category name/slug |
//! | `23503` foreign key violation | `Validation` | product references an unknown category |
//! | `23514` check violation | `Conflict` | a write would break `stock_quantity >= 0` |
//! | `22003` numeric out of range | `Conflict` | counter overflow in an administrative write |
//! | any other / pool closed / IO | `Backend` | |

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::{
    Category, CategoryPatch, Price, Product, ProductDraft, ProductPatch, ProductQuery, SortField,
};
use stockroom_core::{CategoryId, ProductId};
use stockroom_inventory::{Quantity, StockLevel, StockSnapshot, StockUpdate};

use super::r#trait::{CatalogStore, StockStore, StoreError};

/// Idempotent bootstrap DDL for the two tables the service reads and writes.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id             UUID PRIMARY KEY,
    name           TEXT NOT NULL,
    description    TEXT NOT NULL DEFAULT '',
    price_cents    BIGINT NOT NULL CHECK (price_cents >= 0),
    category_id    UUID REFERENCES categories (id) ON DELETE SET NULL,
    stock_quantity BIGINT NOT NULL CHECK (stock_quantity >= 0),
    is_active      BOOLEAN NOT NULL DEFAULT TRUE,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_active_created
    ON products (is_active, created_at DESC);
"#;

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, category_id, stock_quantity, is_active, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at";

/// Postgres store.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync` and shared by clone.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables when they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn read_snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        let row = sqlx::query("SELECT id, name, price_cents, stock_quantity FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_snapshot", e))?;
        row.as_ref().map(snapshot_from_row).transpose()
    }
}

fn cents_to_db(price: Price) -> Result<i64, StoreError> {
    i64::try_from(price.cents())
        .map_err(|_| StoreError::Validation(format!("price {price} is out of range")))
}

fn decode_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {e}"))
}

fn price_from_row(row: &PgRow) -> Result<Price, StoreError> {
    let cents: i64 = row.try_get("price_cents").map_err(decode_err)?;
    u64::try_from(cents)
        .map(Price::from_cents)
        .map_err(|_| StoreError::Backend(format!("negative price_cents {cents} in storage")))
}

fn snapshot_from_row(row: &PgRow) -> Result<StockSnapshot, StoreError> {
    Ok(StockSnapshot {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        price: price_from_row(row)?,
        stock_quantity: row.try_get("stock_quantity").map_err(decode_err)?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        price: price_from_row(row)?,
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")
            .map_err(decode_err)?
            .map(CategoryId::from_uuid),
        stock_quantity: row.try_get("stock_quantity").map_err(decode_err)?,
        is_active: row.try_get("is_active").map_err(decode_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_err)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode_err)?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        slug: row.try_get("slug").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_err)?,
    })
}

/// `%term%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn order_by_clause(query: &ProductQuery) -> &'static str {
    match (query.ordering.field, query.ordering.descending) {
        (SortField::Name, false) => "ORDER BY name ASC, id ASC",
        (SortField::Name, true) => "ORDER BY name DESC, id DESC",
        (SortField::Price, false) => "ORDER BY price_cents ASC, id ASC",
        (SortField::Price, true) => "ORDER BY price_cents DESC, id DESC",
        (SortField::CreatedAt, false) => "ORDER BY created_at ASC, id ASC",
        (SortField::CreatedAt, true) => "ORDER BY created_at DESC, id DESC",
    }
}

#[async_trait::async_trait]
impl StockStore for PostgresStore {
    #[instrument(skip_all, fields(product_id = %product_id, quantity = %quantity), err)]
    async fn reserve(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        // The WHERE guard is re-evaluated against the latest row version under
        // concurrent updates, so two reservations can never both pass it on a
        // level that only covers one of them.
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $2
            WHERE id = $1 AND stock_quantity >= $2
            RETURNING id, name, price_cents, stock_quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(quantity.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserve", e))?;

        match updated {
            Some(row) => Ok(StockUpdate::Applied(snapshot_from_row(&row)?)),
            None => self.apply_locked(product_id, "reserve", |level| level.reserve(quantity).ok()).await,
        }
    }

    #[instrument(skip_all, fields(product_id = %product_id, quantity = %quantity), err)]
    async fn release(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2
            WHERE id = $1 AND stock_quantity <= 9223372036854775807 - $2
            RETURNING id, name, price_cents, stock_quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(quantity.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release", e))?;

        match updated {
            Some(row) => Ok(StockUpdate::Applied(snapshot_from_row(&row)?)),
            None => self.apply_locked(product_id, "release", |level| level.release(quantity).ok()).await,
        }
    }

    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        self.read_snapshot(product_id).await
    }
}

impl PostgresStore {
    /// Slow path once the single-statement update matched no row: take the
    /// row lock, decide with `step` against the locked level, and write. A
    /// `Rejected` snapshot is therefore the exact level the check failed on;
    /// no concurrent write can land between the read and the decision.
    async fn apply_locked<F>(&self, product_id: ProductId, operation: &str, step: F) -> Result<StockUpdate, StoreError>
    where
        F: FnOnce(StockLevel) -> Option<StockLevel> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query("SELECT id, name, price_cents, stock_quantity FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let Some(row) = row else {
            return Ok(StockUpdate::Missing);
        };
        let locked = snapshot_from_row(&row)?;

        let Some(next) = step(StockLevel::new(locked.stock_quantity)?) else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(StockUpdate::Rejected(locked));
        };

        sqlx::query("UPDATE products SET stock_quantity = $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(next.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(StockUpdate::Applied(StockSnapshot {
            stock_quantity: next.get(),
            ..locked
        }))
    }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    async fn create_category(&self, category: Category) -> Result<Category, StoreError> {
        sqlx::query(
            "INSERT INTO categories (id, name, slug, description, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_category", e))?;
        Ok(category)
    }

    async fn list_categories(&self, search: Option<&str>) -> Result<Vec<Category>, StoreError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1) \
             ORDER BY name ASC"
        ))
        .bind(pattern)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;

        rows.iter().map(category_from_row).collect()
    }

    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn update_category(&self, slug: &str, patch: CategoryPatch) -> Result<Category, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 FOR UPDATE"
        ))
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?
        .ok_or(StoreError::NotFound)?;

        let mut category = category_from_row(&row)?;
        category.apply(patch)?;

        sqlx::query("UPDATE categories SET name = $2, slug = $3, description = $4 WHERE id = $1")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_category", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<(), StoreError> {
        // ON DELETE SET NULL detaches the products.
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_product(&self, product: Product) -> Result<Product, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(cents_to_db(product.price)?)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(product)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, query), err)]
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let min = query.min_price.map(cents_to_db).transpose()?;
        let max = query.max_price.map(cents_to_db).transpose()?;
        let pattern = query.search_term().map(|t| like_pattern(&t));

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = TRUE
                AND ($1::boolean IS NULL OR is_active = $1)
                AND ($2::uuid IS NULL OR category_id = $2)
                AND ($3::bigint IS NULL OR price_cents >= $3)
                AND ($4::bigint IS NULL OR price_cents <= $4)
                AND (NOT $5 OR stock_quantity > 0)
                AND ($6::text IS NULL OR name ILIKE $6 OR description ILIKE $6)
            {}
            "#,
            order_by_clause(query)
        );

        let rows = sqlx::query(&sql)
            .bind(query.is_active)
            .bind(query.category.map(Uuid::from))
            .bind(min)
            .bind(max)
            .bind(query.in_stock)
            .bind(pattern)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn replace_product(&self, product_id: ProductId, draft: ProductDraft) -> Result<Product, StoreError> {
        self.rewrite_product(product_id, |p| Ok(p.replace(draft, Utc::now())?)).await
    }

    async fn patch_product(&self, product_id: ProductId, patch: ProductPatch) -> Result<Product, StoreError> {
        self.rewrite_product(product_id, |p| Ok(p.apply_patch(patch, Utc::now())?)).await
    }

    async fn deactivate_product(&self, product_id: ProductId) -> Result<Product, StoreError> {
        self.rewrite_product(product_id, |p| {
            p.deactivate(Utc::now());
            Ok(())
        })
        .await
    }
}

impl PostgresStore {
    /// Read-modify-write of one product row under `SELECT ... FOR UPDATE`, so
    /// concurrent reserve/release on the row wait for the commit.
    async fn rewrite_product<F>(&self, product_id: ProductId, edit: F) -> Result<Product, StoreError>
    where
        F: FnOnce(&mut Product) -> Result<(), StoreError> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rewrite_product", e))?
        .ok_or(StoreError::NotFound)?;

        let mut product = product_from_row(&row)?;
        edit(&mut product)?;

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                price_cents = $4,
                category_id = $5,
                stock_quantity = $6,
                is_active = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(cents_to_db(product.price)?)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rewrite_product", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(product)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::Validation(msg),
                Some("23514") | Some("22003") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
