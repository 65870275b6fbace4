//! Infrastructure layer: storage adapters, the inventory ledger, configuration.

pub mod config;
pub mod ledger;
pub mod store;

pub use config::{Config, ConfigError};
pub use ledger::{InventoryLedger, LedgerError};
pub use store::{CatalogStore, InMemoryStore, PostgresStore, StockStore, StoreError};
