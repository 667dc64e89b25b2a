//! Shopify platform integration.
//!
//! # Security
//!
//! The API secret signs install callbacks, webhooks, and session tokens, and
//! per-shop access tokens grant Admin API access to a merchant's store. Both
//! are held as `SecretString` and never logged.
//!
//! # Layout
//!
//! - [`signature`] - HMAC verification of install queries and webhook bodies
//! - [`session_token`] - HS256 session token verification for the embedded frontend
//! - [`oauth`] - Authorize URL construction
//! - [`ShopifyClient`] - Token exchange, `shop.json`, and webhook subscription calls
//!
//! Everything that talks to the network sits behind [`ShopifyApi`] so the
//! install flow can run against a scripted fake in tests.

mod client;
pub mod oauth;
pub mod queries;
pub mod session_token;
pub mod signature;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use product_merge_core::{ShopDomain, WebhookTopic};

use crate::models::{Credential, ShopProfile, WebhookSubscription};

pub use client::ShopifyClient;

/// Errors that can occur when calling the Shopify APIs.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the upstream body retained.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User error from mutation (e.g., invalid callback URL).
    #[error("User error: {0}")]
    UserError(String),
}

impl ShopifyError {
    /// Whether the underlying request hit the client timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outbound operations against a merchant's shop.
///
/// Implemented by [`ShopifyClient`] in production.
#[async_trait]
pub trait ShopifyApi: Send + Sync {
    /// Trade a one-time authorization code for an offline access token.
    ///
    /// Sent exactly once; never retried.
    async fn exchange_code(&self, shop: &ShopDomain, code: &str)
    -> Result<Credential, ShopifyError>;

    /// Fetch the shop's settings snapshot.
    async fn fetch_shop_profile(&self, credential: &Credential)
    -> Result<ShopProfile, ShopifyError>;

    /// List the shop's existing subscriptions for one topic.
    async fn list_webhook_subscriptions(
        &self,
        credential: &Credential,
        topic: WebhookTopic,
    ) -> Result<Vec<WebhookSubscription>, ShopifyError>;

    /// Create a subscription, returning its platform ID.
    async fn create_webhook_subscription(
        &self,
        credential: &Credential,
        subscription: &WebhookSubscription,
    ) -> Result<String, ShopifyError>;
}
