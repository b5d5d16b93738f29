use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{DocumentStore, InMemoryStore, RestDocumentStore};

/// Shared state handed to every router: configuration plus the document store.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    /// Build the store selected by `store_backend`.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(InMemoryStore::new())
            }
            StoreBackend::Supabase => {
                info!("Using Supabase document store at {}", config.supabase_url);
                Arc::new(RestDocumentStore::new(&config))
            }
        };
        Self::new(config, store)
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()))
    }
}
