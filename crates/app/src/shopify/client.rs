//! HTTP client for the OAuth token endpoint and the Admin API.

use std::sync::Arc;

use async_trait::async_trait;
use graphql_client::{GraphQLQuery, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;

use product_merge_core::{ShopDomain, WebhookTopic};

use crate::config::ShopifyAppConfig;
use crate::models::{Credential, ShopProfile, WebhookFormat, WebhookSubscription};

use super::queries::{
    WebhookSubscriptionCreate, WebhookSubscriptions, webhook_subscription_create,
    webhook_subscriptions,
};
use super::types::{AccessTokenResponse, ShopEnvelope};
use super::{GraphQLError, ShopifyApi, ShopifyError};

/// Page size for subscription listings; a shop never has more per topic.
const SUBSCRIPTION_PAGE_SIZE: i64 = 100;

/// Shopify API client shared by every request.
///
/// Cheap to clone. The access token is passed per call since each shop has
/// its own.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    api_version: String,
    client_id: String,
    client_secret: SecretString,
    /// Replaces `https://{shop}` when set; tests point it at a local server.
    origin: Option<String>,
}

impl ShopifyClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the TLS backend cannot be initialized.
    pub fn new(config: &ShopifyAppConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("product-merge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                api_version: config.api_version.clone(),
                client_id: config.api_key.clone(),
                client_secret: config.api_secret.clone(),
                origin: None,
            }),
        })
    }

    /// Create a client that sends every shop's traffic to `origin`.
    #[cfg(test)]
    fn with_origin(config: &ShopifyAppConfig, origin: String) -> Result<Self, ShopifyError> {
        let mut client = Self::new(config)?;
        if let Some(inner) = Arc::get_mut(&mut client.inner) {
            inner.origin = Some(origin);
        }
        Ok(client)
    }

    fn shop_origin(&self, shop: &ShopDomain) -> String {
        self.inner
            .origin
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    fn admin_url(&self, shop: &ShopDomain, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{path}",
            self.shop_origin(shop),
            self.inner.api_version
        )
    }

    /// Read a response body, failing with the status and body text on non-2xx.
    async fn read_body(response: reqwest::Response) -> Result<String, ShopifyError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or revoked access token".to_string(),
            ));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ShopifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Execute a GraphQL operation against a shop.
    async fn execute<Q: GraphQLQuery>(
        &self,
        credential: &Credential,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError>
    where
        Q::ResponseData: DeserializeOwned,
    {
        let endpoint = self.admin_url(&credential.shop, "graphql.json");
        let body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&endpoint)
            .header("X-Shopify-Access-Token", credential.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        let graphql_response: Response<Q::ResponseData> = serde_json::from_str(&text)?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError { message: e.message })
                    .collect(),
            ));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
            }])
        })
    }
}

#[async_trait]
impl ShopifyApi for ShopifyClient {
    #[instrument(skip(self, code), fields(shop = %shop))]
    async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<Credential, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.shop_origin(shop));

        let params = [
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;
        let text = Self::read_body(response).await?;
        let token: AccessTokenResponse = serde_json::from_str(&text)?;

        tracing::info!(scope = %token.scope, "Exchanged authorization code");

        Ok(Credential::new(
            shop.clone(),
            SecretString::from(token.access_token),
            &token.scope,
        ))
    }

    #[instrument(skip(self, credential), fields(shop = %credential.shop))]
    async fn fetch_shop_profile(
        &self,
        credential: &Credential,
    ) -> Result<ShopProfile, ShopifyError> {
        let url = self.admin_url(&credential.shop, "shop.json");

        let response = self
            .inner
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", credential.access_token.expose_secret())
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        let envelope: ShopEnvelope = serde_json::from_str(&text)?;

        Ok(envelope.shop.into())
    }

    #[instrument(skip(self, credential), fields(shop = %credential.shop, topic = %topic))]
    async fn list_webhook_subscriptions(
        &self,
        credential: &Credential,
        topic: WebhookTopic,
    ) -> Result<Vec<WebhookSubscription>, ShopifyError> {
        let variables = webhook_subscriptions::Variables {
            first: SUBSCRIPTION_PAGE_SIZE,
            topics: vec![topic.graphql_name().to_string()],
        };

        let data = self
            .execute::<WebhookSubscriptions>(credential, variables)
            .await?;

        let subscriptions = data
            .webhook_subscriptions
            .nodes
            .into_iter()
            .filter_map(|node| {
                let webhook_subscriptions::Endpoint::WebhookHttpEndpoint { callback_url } =
                    node.endpoint
                else {
                    return None;
                };
                let topic = WebhookTopic::from_graphql_name(&node.topic).ok()?;
                Some(WebhookSubscription {
                    id: Some(node.id),
                    topic,
                    callback_url,
                    format: WebhookFormat::Json,
                })
            })
            .collect();

        Ok(subscriptions)
    }

    #[instrument(skip(self, credential, subscription), fields(shop = %credential.shop, topic = %subscription.topic))]
    async fn create_webhook_subscription(
        &self,
        credential: &Credential,
        subscription: &WebhookSubscription,
    ) -> Result<String, ShopifyError> {
        let variables = webhook_subscription_create::Variables {
            topic: subscription.topic.graphql_name().to_string(),
            webhook_subscription: webhook_subscription_create::WebhookSubscriptionInput {
                callback_url: subscription.callback_url.clone(),
                format: subscription.format,
            },
        };

        let data = self
            .execute::<WebhookSubscriptionCreate>(credential, variables)
            .await?;

        let payload = data.webhook_subscription_create.ok_or_else(|| {
            ShopifyError::UserError("webhookSubscriptionCreate returned no payload".to_string())
        })?;

        if !payload.user_errors.is_empty() {
            let messages: Vec<String> = payload
                .user_errors
                .into_iter()
                .map(|e| e.message)
                .collect();
            return Err(ShopifyError::UserError(messages.join("; ")));
        }

        payload
            .webhook_subscription
            .map(|s| s.id)
            .ok_or_else(|| ShopifyError::UserError("No subscription returned".to_string()))
    }
}
