//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::db::{self, MemoryShopStore, PgShopStore, RepositoryError, ShopStore};
use crate::services::NonceCache;
use crate::shopify::{ShopifyApi, ShopifyClient, ShopifyError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Shopify client setup failed: {0}")]
    Shopify(#[from] ShopifyError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// shop store, the Shopify client, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn ShopStore>,
    shopify: Arc<dyn ShopifyApi>,
    nonces: NonceCache,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn ShopStore>, shopify: Arc<dyn ShopifyApi>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                shopify,
                nonces: NonceCache::new(),
            }),
        }
    }

    /// Build the store and Shopify client the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns an error if the database pool cannot connect or the HTTP
    /// client cannot be built.
    pub async fn from_config(config: AppConfig) -> Result<Self, StateError> {
        let store: Arc<dyn ShopStore> = match &config.store {
            StoreBackend::Postgres { database_url } => {
                let pool = db::create_pool(database_url).await?;
                tracing::info!("Connected to PostgreSQL");
                Arc::new(PgShopStore::new(pool))
            }
            StoreBackend::Memory => Arc::new(MemoryShopStore::new()),
        };
        let shopify: Arc<dyn ShopifyApi> = Arc::new(ShopifyClient::new(&config.shopify)?);

        Ok(Self::new(config, store, shopify))
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the shop store.
    #[must_use]
    pub fn store(&self) -> &dyn ShopStore {
        self.inner.store.as_ref()
    }

    /// Get a handle to the Shopify API client.
    #[must_use]
    pub fn shopify(&self) -> Arc<dyn ShopifyApi> {
        Arc::clone(&self.inner.shopify)
    }

    /// Get a reference to the pending OAuth nonces.
    #[must_use]
    pub fn nonces(&self) -> &NonceCache {
        &self.inner.nonces
    }

    /// Check that the shop store is reachable.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot be reached.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.store.ping().await
    }
}
