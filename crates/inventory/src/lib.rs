//! Inventory reservation domain module.
//!
//! The stock transition rules (reserve / release), the validated `Quantity`
//! input and the tagged outcomes the ledger reports. Pure logic: the atomic
//! application of these rules against stored rows lives in `stockroom-infra`.

pub mod outcome;
pub mod quantity;
pub mod stock;

pub use outcome::{AvailabilityReport, ReleaseOutcome, ReserveOutcome, StockSnapshot, StockUpdate};
pub use quantity::Quantity;
pub use stock::{InsufficientStock, StockLevel};
