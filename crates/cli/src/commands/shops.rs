//! Installed shop commands.
//!
//! # Usage
//!
//! ```bash
//! pm-cli shops list
//! pm-cli shops show store.myshopify.com
//! pm-cli shops remove store.myshopify.com
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use product_merge_app::db::{self, PgShopStore, RepositoryError, ShopStore};
use product_merge_core::{ShopDomain, ShopDomainError};
use thiserror::Error;

use super::{CommandError, database_url};

/// Errors that can occur during shop commands.
#[derive(Debug, Error)]
pub enum ShopsError {
    #[error(transparent)]
    Setup(#[from] CommandError),

    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[from] ShopDomainError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Shop is not installed: {0}")]
    NotInstalled(ShopDomain),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

async fn connect() -> Result<PgShopStore, ShopsError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url)
        .await
        .map_err(CommandError::from)?;
    Ok(PgShopStore::new(pool))
}

/// Print one line per installed shop.
pub async fn list() -> Result<(), ShopsError> {
    let store = connect().await?;
    let shops = store.list_shops().await?;

    #[allow(clippy::print_stdout)]
    {
        for shop in &shops {
            let name = shop
                .profile
                .as_ref()
                .and_then(|p| p.display_name.as_deref())
                .unwrap_or("-");
            println!(
                "{:>6}  {:<40}  {:<30}  installed {}",
                shop.id,
                shop.shop,
                name,
                shop.issued_at.format("%Y-%m-%d %H:%M")
            );
        }
        println!("{} shop(s)", shops.len());
    }

    Ok(())
}

/// Print a shop record as pretty JSON.
pub async fn show(shop: &str) -> Result<(), ShopsError> {
    let shop = ShopDomain::parse(shop)?;
    let store = connect().await?;

    let record = store
        .get_shop(&shop)
        .await?
        .ok_or(ShopsError::NotInstalled(shop))?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    Ok(())
}

/// Delete a shop's stored credential.
pub async fn remove(shop: &str) -> Result<(), ShopsError> {
    let shop = ShopDomain::parse(shop)?;
    let store = connect().await?;

    if store.delete_shop(&shop).await? {
        tracing::info!(%shop, "Removed shop");
    } else {
        tracing::warn!(%shop, "Shop was not installed; nothing removed");
    }

    Ok(())
}
