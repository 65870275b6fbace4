//! Inventory ledger: validated reserve / release / availability over a `StockStore`.
//!
//! The ledger owns quantity validation and the translation of raw store
//! updates into business outcomes. Atomicity of each mutation is the store's
//! job; the ledger never reads-then-writes.

use thiserror::Error;
use tracing::{info, instrument, warn};

use stockroom_core::ProductId;
use stockroom_inventory::{AvailabilityReport, Quantity, ReleaseOutcome, ReserveOutcome, StockUpdate};

use crate::store::{StockStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Requested quantity is not a positive integer. Nothing was touched.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: StockStore> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn quantity(requested: i64) -> Result<Quantity, LedgerError> {
        Quantity::new(requested).map_err(|e| LedgerError::InvalidQuantity(e.to_string()))
    }

    /// Decrement stock by `requested` units if, and only if, the current level covers it.
    #[instrument(skip_all, fields(product_id = %product_id, requested = requested), err)]
    pub async fn reserve(&self, product_id: ProductId, requested: i64) -> Result<ReserveOutcome, LedgerError> {
        let quantity = Self::quantity(requested)?;

        Ok(match self.store.reserve(product_id, quantity).await? {
            StockUpdate::Applied(snapshot) => {
                info!(remaining = snapshot.stock_quantity, "reserved stock");
                ReserveOutcome::Reserved {
                    product_id,
                    name: snapshot.name,
                    quantity,
                    remaining_stock: snapshot.stock_quantity,
                }
            }
            StockUpdate::Rejected(snapshot) => {
                warn!(available = snapshot.stock_quantity, "insufficient stock");
                ReserveOutcome::InsufficientStock {
                    product_id,
                    name: snapshot.name,
                    requested: quantity,
                    available_stock: snapshot.stock_quantity,
                }
            }
            StockUpdate::Missing => {
                warn!("reserve against unknown product");
                ReserveOutcome::NotFound { product_id }
            }
        })
    }

    /// Return `requested` units to stock. Unbounded: no record of prior
    /// reservations is kept, so any positive quantity is accepted. A store
    /// rejection means the counter would overflow and surfaces as a conflict.
    #[instrument(skip_all, fields(product_id = %product_id, requested = requested), err)]
    pub async fn release(&self, product_id: ProductId, requested: i64) -> Result<ReleaseOutcome, LedgerError> {
        let quantity = Self::quantity(requested)?;

        Ok(match self.store.release(product_id, quantity).await? {
            StockUpdate::Applied(snapshot) => {
                info!(current = snapshot.stock_quantity, "released stock");
                ReleaseOutcome::Released {
                    product_id,
                    name: snapshot.name,
                    quantity,
                    current_stock: snapshot.stock_quantity,
                }
            }
            StockUpdate::Rejected(snapshot) => {
                warn!(current = snapshot.stock_quantity, "release would overflow stock counter");
                return Err(StoreError::Conflict(format!(
                    "releasing {quantity} units would overflow stock level {}",
                    snapshot.stock_quantity
                ))
                .into());
            }
            StockUpdate::Missing => {
                warn!("release against unknown product");
                ReleaseOutcome::NotFound { product_id }
            }
        })
    }

    /// Read-only check; `None` when the product does not exist.
    #[instrument(skip_all, fields(product_id = %product_id, requested = requested), err)]
    pub async fn check_availability(
        &self,
        product_id: ProductId,
        requested: i64,
    ) -> Result<Option<AvailabilityReport>, LedgerError> {
        let quantity = Self::quantity(requested)?;
        let snapshot = self.store.snapshot(product_id).await?;
        Ok(snapshot.map(|s| AvailabilityReport::from_snapshot(s, quantity)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use stockroom_catalog::{Price, ProductDraft};

    use super::*;
    use crate::store::{CatalogStore, InMemoryStore};

    async fn seeded(stock: i64) -> (InventoryLedger<Arc<InMemoryStore>>, ProductId) {
        let store = Arc::new(InMemoryStore::new());
        let product = ProductDraft {
            name: "Widget".to_string(),
            description: String::new(),
            price: Price::from_cents(999),
            category_id: None,
            stock_quantity: stock,
            is_active: true,
        }
        .into_product(ProductId::new(), Utc::now())
        .unwrap();
        let id = product.id;
        store.create_product(product).await.unwrap();
        (InventoryLedger::new(store), id)
    }

    async fn stock_of(ledger: &InventoryLedger<Arc<InMemoryStore>>, id: ProductId) -> i64 {
        ledger.store().snapshot(id).await.unwrap().unwrap().stock_quantity
    }

    #[tokio::test]
    async fn reserve_release_worked_example() {
        let (ledger, id) = seeded(10).await;

        match ledger.reserve(id, 5).await.unwrap() {
            ReserveOutcome::Reserved { remaining_stock, name, .. } => {
                assert_eq!(remaining_stock, 5);
                assert_eq!(name, "Widget");
            }
            other => panic!("expected Reserved, got {other:?}"),
        }

        match ledger.reserve(id, 6).await.unwrap() {
            ReserveOutcome::InsufficientStock { available_stock, .. } => assert_eq!(available_stock, 5),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        match ledger.release(id, 3).await.unwrap() {
            ReleaseOutcome::Released { current_stock, .. } => assert_eq!(current_stock, 8),
            other => panic!("expected Released, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected_without_mutation() {
        let (ledger, id) = seeded(10).await;

        for bad in [0, -1] {
            assert!(matches!(ledger.reserve(id, bad).await, Err(LedgerError::InvalidQuantity(_))));
            assert!(matches!(ledger.release(id, bad).await, Err(LedgerError::InvalidQuantity(_))));
            assert!(matches!(
                ledger.check_availability(id, bad).await,
                Err(LedgerError::InvalidQuantity(_))
            ));
        }
        assert_eq!(stock_of(&ledger, id).await, 10);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (ledger, _) = seeded(1).await;
        let ghost = ProductId::new();

        assert_eq!(
            ledger.reserve(ghost, 1).await.unwrap(),
            ReserveOutcome::NotFound { product_id: ghost }
        );
        assert_eq!(
            ledger.release(ghost, 1).await.unwrap(),
            ReleaseOutcome::NotFound { product_id: ghost }
        );
        assert!(ledger.check_availability(ghost, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn availability_does_not_mutate() {
        let (ledger, id) = seeded(3).await;

        let report = ledger.check_availability(id, 3).await.unwrap().unwrap();
        assert!(report.available);
        let report = ledger.check_availability(id, 4).await.unwrap().unwrap();
        assert!(!report.available);
        assert_eq!(report.stock_quantity, 3);
        assert_eq!(stock_of(&ledger, id).await, 3);
    }

    #[tokio::test]
    async fn reserve_then_release_restores_stock() {
        let (ledger, id) = seeded(7).await;
        ledger.reserve(id, 7).await.unwrap();
        assert_eq!(stock_of(&ledger, id).await, 0);
        ledger.release(id, 7).await.unwrap();
        assert_eq!(stock_of(&ledger, id).await, 7);
    }

    #[tokio::test]
    async fn release_overflow_is_a_conflict_and_keeps_stock() {
        let (ledger, id) = seeded(5).await;
        match ledger.release(id, i64::MAX).await {
            Err(LedgerError::Storage(StoreError::Conflict(msg))) => assert!(msg.contains("overflow")),
            other => panic!("expected overflow conflict, got {other:?}"),
        }
        assert_eq!(stock_of(&ledger, id).await, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reservations_never_oversell() {
        const STOCK: i64 = 50;
        const QTY: i64 = 3;
        const TASKS: usize = 64;

        let (ledger, id) = seeded(STOCK).await;
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.reserve(id, QTY).await.unwrap() })
            })
            .collect();

        let mut reserved = 0i64;
        for handle in handles {
            if let ReserveOutcome::Reserved { .. } = handle.await.unwrap() {
                reserved += 1;
            }
        }

        assert_eq!(reserved, STOCK / QTY);
        assert_eq!(stock_of(&ledger, id).await, STOCK - QTY * (STOCK / QTY));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn mixed_concurrent_traffic_balances() {
        let (ledger, id) = seeded(20).await;
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        match ledger.reserve(id, 2).await.unwrap() {
                            ReserveOutcome::Reserved { remaining_stock, .. } => {
                                assert!(remaining_stock >= 0);
                                -2
                            }
                            _ => 0,
                        }
                    } else {
                        ledger.release(id, 1).await.unwrap();
                        1
                    }
                })
            })
            .collect();

        let mut delta = 0i64;
        for handle in handles {
            delta += handle.await.unwrap();
        }

        let final_stock = stock_of(&ledger, id).await;
        assert!(final_stock >= 0);
        assert_eq!(final_stock, 20 + delta);
    }
}
