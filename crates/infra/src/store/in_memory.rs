use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use chrono::Utc;

use stockroom_catalog::{Category, CategoryPatch, Product, ProductDraft, ProductPatch, ProductQuery};
use stockroom_core::{CategoryId, Entity, ProductId};
use stockroom_inventory::{Quantity, StockLevel, StockSnapshot, StockUpdate};

use super::r#trait::{CatalogStore, StockStore, StoreError};

/// One product row. Catalog metadata sits behind the map lock; the stock
/// counter is its own atomic so ledger operations only need a shared guard.
#[derive(Debug)]
struct ProductRow {
    product: Product,
    stock: AtomicI64,
}

impl ProductRow {
    fn new(product: Product) -> Self {
        let stock = AtomicI64::new(product.stock_quantity);
        Self { product, stock }
    }

    fn materialize(&self) -> Product {
        let mut product = self.product.clone();
        product.stock_quantity = self.stock.load(Ordering::Acquire);
        product
    }

    fn snapshot_at(&self, stock_quantity: i64) -> StockSnapshot {
        StockSnapshot {
            product_id: self.product.id,
            name: self.product.name.clone(),
            price: self.product.price,
            stock_quantity,
        }
    }
}

/// In-memory catalog + stock store.
///
/// Intended for tests/dev and single-instance deployments. Reserve is a
/// compare-and-swap loop on the row's counter, so concurrent reservations of
/// the same product serialize on that row only.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    categories: RwLock<HashMap<CategoryId, Category>>,
    products: RwLock<HashMap<ProductId, ProductRow>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_category_exists(
        categories: &HashMap<CategoryId, Category>,
        category_id: Option<CategoryId>,
    ) -> Result<(), StoreError> {
        match category_id {
            Some(id) if !categories.contains_key(&id) => {
                Err(StoreError::Validation(format!("unknown category {id}")))
            }
            _ => Ok(()),
        }
    }

    fn ensure_unique_category(
        categories: &HashMap<CategoryId, Category>,
        candidate: &Category,
    ) -> Result<(), StoreError> {
        for existing in categories.values() {
            if existing.id == candidate.id {
                continue;
            }
            if existing.slug == candidate.slug {
                return Err(StoreError::Conflict(format!(
                    "category slug {:?} already exists",
                    candidate.slug
                )));
            }
            if existing.name == candidate.name {
                return Err(StoreError::Conflict(format!(
                    "category name {:?} already exists",
                    candidate.name
                )));
            }
        }
        Ok(())
    }

    /// Rewrite a product row under the write lock. `edit` sees the row with its
    /// live stock value; whatever it leaves in `stock_quantity` is stored back.
    fn edit_product<F>(&self, product_id: ProductId, edit: F) -> Result<Product, StoreError>
    where
        F: FnOnce(&mut Product) -> Result<(), StoreError>,
    {
        let mut products = self.products.write().map_err(|_| poisoned())?;
        let row = products.get_mut(&product_id).ok_or(StoreError::NotFound)?;

        let mut updated = row.materialize();
        edit(&mut updated)?;

        row.stock.store(updated.stock_quantity, Ordering::Release);
        row.product = updated.clone();
        Ok(updated)
    }
}

#[async_trait::async_trait]
impl StockStore for InMemoryStore {
    async fn reserve(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        let Some(row) = products.get(&product_id) else {
            return Ok(StockUpdate::Missing);
        };

        let attempt = row.stock.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let level = StockLevel::new(current).ok()?;
            level.reserve(quantity).ok().map(|next| next.get())
        });

        Ok(match attempt {
            Ok(previous) => StockUpdate::Applied(row.snapshot_at(previous - quantity.get())),
            Err(current) => StockUpdate::Rejected(row.snapshot_at(current)),
        })
    }

    async fn release(&self, product_id: ProductId, quantity: Quantity) -> Result<StockUpdate, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        let Some(row) = products.get(&product_id) else {
            return Ok(StockUpdate::Missing);
        };

        let attempt = row.stock.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let level = StockLevel::new(current).ok()?;
            level.release(quantity).ok().map(|next| next.get())
        });

        Ok(match attempt {
            Ok(previous) => StockUpdate::Applied(row.snapshot_at(previous + quantity.get())),
            Err(current) => StockUpdate::Rejected(row.snapshot_at(current)),
        })
    }

    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(products
            .get(&product_id)
            .map(|row| row.snapshot_at(row.stock.load(Ordering::Acquire))))
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_category(&self, category: Category) -> Result<Category, StoreError> {
        let mut categories = self.categories.write().map_err(|_| poisoned())?;
        Self::ensure_unique_category(&categories, &category)?;
        categories.insert(*category.id(), category.clone());
        Ok(category)
    }

    async fn list_categories(&self, search: Option<&str>) -> Result<Vec<Category>, StoreError> {
        let categories = self.categories.read().map_err(|_| poisoned())?;
        let mut out: Vec<Category> = categories
            .values()
            .filter(|c| search.map_or(true, |term| c.matches_search(term)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let categories = self.categories.read().map_err(|_| poisoned())?;
        Ok(categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn update_category(&self, slug: &str, patch: CategoryPatch) -> Result<Category, StoreError> {
        let mut categories = self.categories.write().map_err(|_| poisoned())?;
        let mut updated = categories
            .values()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        updated.apply(patch)?;
        Self::ensure_unique_category(&categories, &updated)?;
        categories.insert(*updated.id(), updated.clone());
        Ok(updated)
    }

    async fn delete_category(&self, slug: &str) -> Result<(), StoreError> {
        let mut categories = self.categories.write().map_err(|_| poisoned())?;
        let id = categories
            .values()
            .find(|c| c.slug == slug)
            .map(|c| c.id)
            .ok_or(StoreError::NotFound)?;
        categories.remove(&id);

        let mut products = self.products.write().map_err(|_| poisoned())?;
        for row in products.values_mut() {
            if row.product.category_id == Some(id) {
                row.product.category_id = None;
            }
        }
        Ok(())
    }

    async fn create_product(&self, product: Product) -> Result<Product, StoreError> {
        // Category guard is held until the row is in, so a concurrent
        // delete_category cannot leave it dangling.
        let categories = self.categories.read().map_err(|_| poisoned())?;
        Self::ensure_category_exists(&categories, product.category_id)?;
        let mut products = self.products.write().map_err(|_| poisoned())?;
        let id = *product.id();
        if products.contains_key(&id) {
            return Err(StoreError::Conflict(format!("product {id} already exists")));
        }
        products.insert(id, ProductRow::new(product.clone()));
        Ok(product)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(products.get(&product_id).map(ProductRow::materialize))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        let rows: Vec<Product> = products.values().map(ProductRow::materialize).collect();
        Ok(query.apply(&rows))
    }

    async fn replace_product(&self, product_id: ProductId, draft: ProductDraft) -> Result<Product, StoreError> {
        draft.validate()?;
        let categories = self.categories.read().map_err(|_| poisoned())?;
        Self::ensure_category_exists(&categories, draft.category_id)?;
        self.edit_product(product_id, |p| Ok(p.replace(draft, Utc::now())?))
    }

    async fn patch_product(&self, product_id: ProductId, patch: ProductPatch) -> Result<Product, StoreError> {
        patch.validate()?;
        let categories = self.categories.read().map_err(|_| poisoned())?;
        Self::ensure_category_exists(&categories, patch.category_target())?;
        self.edit_product(product_id, |p| Ok(p.apply_patch(patch, Utc::now())?))
    }

    async fn deactivate_product(&self, product_id: ProductId) -> Result<Product, StoreError> {
        self.edit_product(product_id, |p| {
            p.deactivate(Utc::now());
            Ok(())
        })
    }
}
