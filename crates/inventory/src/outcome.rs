use serde::Serialize;

use stockroom_catalog::Price;
use stockroom_core::ProductId;

use crate::quantity::Quantity;

/// Committed view of one product's stock row, as read by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub stock_quantity: i64,
}

/// Result of an atomic conditional update against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockUpdate {
    /// The mutation committed; the snapshot holds the new level.
    Applied(StockSnapshot),
    /// The condition failed; nothing changed and the snapshot holds the level seen.
    Rejected(StockSnapshot),
    /// No product with that id.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved {
        product_id: ProductId,
        name: String,
        quantity: Quantity,
        remaining_stock: i64,
    },
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: Quantity,
        available_stock: i64,
    },
    NotFound {
        product_id: ProductId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released {
        product_id: ProductId,
        name: String,
        quantity: Quantity,
        current_stock: i64,
    },
    NotFound {
        product_id: ProductId,
    },
}

/// Read-only availability answer, built from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub available: bool,
    pub stock_quantity: i64,
    pub requested_quantity: Quantity,
}

impl AvailabilityReport {
    pub fn from_snapshot(snapshot: StockSnapshot, requested: Quantity) -> Self {
        Self {
            available: snapshot.stock_quantity >= requested.get(),
            product_id: snapshot.product_id,
            name: snapshot.name,
            price: snapshot.price,
            stock_quantity: snapshot.stock_quantity,
            requested_quantity: requested,
        }
    }
}
