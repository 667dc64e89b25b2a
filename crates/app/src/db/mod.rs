//! Shop registry storage.
//!
//! # Database: `product_merge`
//!
//! ## Tables
//!
//! - `app.shop` - One row per installed shop: credential plus profile snapshot
//! - `app.user` - Merchants, keyed by contact email
//!
//! # Migrations
//!
//! Migrations are stored in `crates/app/migrations/` and run via:
//! ```bash
//! cargo run -p product-merge-cli -- migrate
//! ```
//!
//! # Backends
//!
//! [`ShopStore`] is implemented by [`PgShopStore`] for production and
//! [`MemoryShopStore`] for local runs and tests. `SHOP_STORE` picks one.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use product_merge_core::{ShopDomain, ShopId};

use crate::models::{Credential, ShopProfile, ShopRecord};

pub use memory::MemoryShopStore;
pub use postgres::PgShopStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Persistence for installed shops, keyed by shop domain.
///
/// Implementations must make `upsert_shop` atomic per shop domain: two
/// concurrent installs for one shop leave exactly one row holding one of the
/// two credentials.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Insert or overwrite the shop's credential.
    ///
    /// Profile fields are written only when `profile` is `Some`; a failed
    /// profile fetch leaves any earlier snapshot in place. A contact email in
    /// the profile is resolved to a user, created on first sight.
    async fn upsert_shop(
        &self,
        credential: &Credential,
        profile: Option<&ShopProfile>,
    ) -> Result<ShopId, RepositoryError>;

    /// The stored credential for a shop, if installed.
    async fn get_credential(&self, shop: &ShopDomain)
    -> Result<Option<Credential>, RepositoryError>;

    /// The stored shop without its access token.
    async fn get_shop(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError>;

    /// Every installed shop, ordered by domain.
    async fn list_shops(&self) -> Result<Vec<ShopRecord>, RepositoryError>;

    /// Remove a shop. Returns `false` if it was not present.
    async fn delete_shop(&self, shop: &ShopDomain) -> Result<bool, RepositoryError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
