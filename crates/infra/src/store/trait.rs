use std::sync::Arc;

use thiserror::Error;

use stockroom_catalog::{Category, CategoryPatch, Product, ProductDraft, ProductPatch, ProductQuery};
use stockroom_core::{DomainError, ProductId};
use stockroom_inventory::{Quantity, StockSnapshot, StockUpdate};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to business outcomes: an
/// insufficient-stock reservation is a `StockUpdate::Rejected`, never an error.
///
/// ## Error Categories
///
/// - **NotFound**: the addressed record does not exist (catalog mutations only)
/// - **Validation**: the payload failed domain validation or references a missing row
/// - **Conflict**: uniqueness violation or counter overflow
/// - **Backend**: the storage engine itself failed (pool closed, IO, poisoned lock)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Validation(msg),
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
        }
    }
}

/// Atomic stock row operations used by the inventory ledger.
///
/// ## Implementation Requirements
///
/// - `reserve` must check `stock_quantity >= quantity` and decrement in one
///   atomic step per product; two concurrent reserves can never jointly
///   overdraw a row.
/// - `release` increments atomically with no business cap. It answers
///   `Rejected` with the unchanged level only when the sum would leave the
///   `i64` range; that is the one case a release is refused.
/// - `snapshot` returns only committed values.
/// - Serialization is per product. A process-wide exclusive lock is not an
///   acceptable implementation.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    async fn reserve(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError>;

    async fn release(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError>;

    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError>;
}

/// Catalog persistence: categories and products.
///
/// Products are never hard-deleted; `deactivate_product` hides them from listings.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_category(&self, category: Category) -> Result<Category, StoreError>;

    async fn list_categories(&self, search: Option<&str>) -> Result<Vec<Category>, StoreError>;

    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    async fn update_category(&self, slug: &str, patch: CategoryPatch) -> Result<Category, StoreError>;

    /// Remove a category and detach it from every product that referenced it.
    async fn delete_category(&self, slug: &str) -> Result<(), StoreError>;

    async fn create_product(&self, product: Product) -> Result<Product, StoreError>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError>;

    async fn replace_product(&self, product_id: ProductId, draft: ProductDraft) -> Result<Product, StoreError>;

    async fn patch_product(&self, product_id: ProductId, patch: ProductPatch) -> Result<Product, StoreError>;

    async fn deactivate_product(&self, product_id: ProductId) -> Result<Product, StoreError>;
}

#[async_trait::async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn reserve(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        (**self).reserve(product_id, quantity).await
    }

    async fn release(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        (**self).release(product_id, quantity).await
    }

    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        (**self).snapshot(product_id).await
    }
}
