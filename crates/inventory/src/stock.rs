use stockroom_core::{DomainError, DomainResult};

use crate::quantity::Quantity;

/// Committed stock level of one product. Never negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StockLevel(i64);

/// A reservation asked for more than the row holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InsufficientStock {
    pub requested: Quantity,
    pub available: StockLevel,
}

impl StockLevel {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value < 0 {
            return Err(DomainError::validation(format!(
                "stock level cannot be negative, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn covers(&self, quantity: Quantity) -> bool {
        self.0 >= quantity.get()
    }

    /// Check-and-decrement. On rejection the level is unchanged.
    pub fn reserve(self, quantity: Quantity) -> Result<StockLevel, InsufficientStock> {
        if !self.covers(quantity) {
            return Err(InsufficientStock {
                requested: quantity,
                available: self,
            });
        }
        Ok(StockLevel(self.0 - quantity.get()))
    }

    /// Unconditional increment. There is no upper bound and no check that the
    /// units were ever reserved; only counter overflow is refused.
    pub fn release(self, quantity: Quantity) -> DomainResult<StockLevel> {
        self.0
            .checked_add(quantity.get())
            .map(StockLevel)
            .ok_or_else(|| DomainError::conflict("stock counter overflow"))
    }
}
