use std::sync::Arc;

use tracing::{info, warn};

use stockroom_infra::{
    CatalogStore, Config, InMemoryStore, InventoryLedger, PostgresStore, StockStore, StoreError,
};

/// Shared handle passed to every handler via `Extension`.
///
/// Catalog and ledger are two views onto the same store, so a reservation is
/// visible to the next catalog read.
pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: InventoryLedger<Arc<dyn StockStore>>,
}

impl AppServices {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + StockStore + 'static,
    {
        let catalog: Arc<dyn CatalogStore> = store.clone();
        let stock: Arc<dyn StockStore> = store;
        Self {
            catalog,
            ledger: InventoryLedger::new(stock),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}

/// Pick the storage adapter from configuration.
pub async fn build_services(config: &Config) -> Result<AppServices, StoreError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.ensure_schema().await?;
            info!(max_connections = config.database_max_connections, "using postgres store");
            Ok(AppServices::new(Arc::new(store)))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store (state is lost on restart)");
            Ok(AppServices::in_memory())
        }
    }
}
