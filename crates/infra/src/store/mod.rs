//! Storage boundary for catalog records and stock rows.
//!
//! Two adapters implement the same traits: an in-memory store for tests/dev
//! and a Postgres store for deployments with more than one service instance.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{CatalogStore, StockStore, StoreError};
