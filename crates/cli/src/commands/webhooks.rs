//! Webhook subscription commands.
//!
//! Install tolerates subscription failures, so a shop can end up missing a
//! topic. This re-runs the idempotent registration for one shop.
//!
//! # Usage
//!
//! ```bash
//! pm-cli webhooks ensure store.myshopify.com
//! ```
//!
//! # Environment Variables
//!
//! Reads the same variables as the app server (`APP_BASE_URL`,
//! `SHOPIFY_API_KEY`, `SHOPIFY_API_SECRET`, `DATABASE_URL`, ...).

use product_merge_app::config::{AppConfig, ConfigError};
use product_merge_app::db::RepositoryError;
use product_merge_app::models::SubscriptionOutcome;
use product_merge_app::services::WebhookSubscriber;
use product_merge_app::state::{AppState, StateError};
use product_merge_core::{ShopDomain, ShopDomainError, WebhookTopic};
use thiserror::Error;

/// Errors that can occur during webhook commands.
#[derive(Debug, Error)]
pub enum WebhooksError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0}")]
    State(#[from] StateError),

    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[from] ShopDomainError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Shop is not installed: {0}")]
    NotInstalled(ShopDomain),

    #[error("{0} topic(s) could not be subscribed")]
    Incomplete(usize),
}

/// Ensure every lifecycle topic is delivered to this deployment.
pub async fn ensure(shop: &str) -> Result<(), WebhooksError> {
    let shop = ShopDomain::parse(shop)?;
    let config = AppConfig::from_env()?;
    let state = AppState::from_config(config).await?;

    let credential = state
        .store()
        .get_credential(&shop)
        .await?
        .ok_or(WebhooksError::NotInstalled(shop))?;

    let subscriber = WebhookSubscriber::new(state.shopify());
    let results = subscriber
        .ensure_all(&credential, &WebhookTopic::ALL, |topic| {
            state.config().webhook_callback_url(topic)
        })
        .await;

    let mut failed = 0;
    for (topic, result) in &results {
        match result {
            Ok(SubscriptionOutcome::Created { id }) => {
                tracing::info!(%topic, %id, "Created subscription");
            }
            Ok(SubscriptionOutcome::AlreadyPresent { .. }) => {
                tracing::info!(%topic, "Subscription already present");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(%topic, error = %e, "Subscription failed");
            }
        }
    }

    if failed > 0 {
        return Err(WebhooksError::Incomplete(failed));
    }
    Ok(())
}
