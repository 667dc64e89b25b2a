//! Idempotent webhook subscription management.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use product_merge_core::WebhookTopic;

use crate::models::{Credential, SubscriptionOutcome, WebhookSubscription};
use crate::shopify::{ShopifyApi, ShopifyError};

/// A topic could not be ensured.
#[derive(Debug, Error)]
#[error("failed to ensure {topic} subscription: {source}")]
pub struct SubscriptionError {
    pub topic: WebhookTopic,
    #[source]
    pub source: ShopifyError,
}

/// Ensures a shop delivers each topic to our callback URL exactly once.
#[derive(Clone)]
pub struct WebhookSubscriber {
    shopify: Arc<dyn ShopifyApi>,
}

impl WebhookSubscriber {
    #[must_use]
    pub fn new(shopify: Arc<dyn ShopifyApi>) -> Self {
        Self { shopify }
    }

    /// Make sure `topic` is delivered to `callback_url`, creating the
    /// subscription only if no matching one exists.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] if listing or creation fails, including
    /// when the platform answers with user errors.
    #[instrument(skip(self, credential), fields(shop = %credential.shop, topic = %topic))]
    pub async fn ensure_subscription(
        &self,
        credential: &Credential,
        topic: WebhookTopic,
        callback_url: &str,
    ) -> Result<SubscriptionOutcome, SubscriptionError> {
        let wrap = |source| SubscriptionError { topic, source };

        let existing = self
            .shopify
            .list_webhook_subscriptions(credential, topic)
            .await
            .map_err(wrap)?;

        if let Some(found) = existing.into_iter().find(|s| s.delivers(topic, callback_url)) {
            tracing::debug!(id = ?found.id, "Subscription already present");
            return Ok(SubscriptionOutcome::AlreadyPresent { id: found.id });
        }

        let id = self
            .shopify
            .create_webhook_subscription(
                credential,
                &WebhookSubscription::new(topic, callback_url),
            )
            .await
            .map_err(wrap)?;

        tracing::info!(%id, "Created webhook subscription");
        Ok(SubscriptionOutcome::Created { id })
    }

    /// Ensure every topic in `topics`, continuing past failures.
    ///
    /// `callback_url` maps a topic to the URL it should be delivered to.
    pub async fn ensure_all(
        &self,
        credential: &Credential,
        topics: &[WebhookTopic],
        callback_url: impl Fn(WebhookTopic) -> String,
    ) -> Vec<(WebhookTopic, Result<SubscriptionOutcome, SubscriptionError>)> {
        let mut results = Vec::with_capacity(topics.len());
        for &topic in topics {
            let result = self
                .ensure_subscription(credential, topic, &callback_url(topic))
                .await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Webhook subscription failed");
            }
            results.push((topic, result));
        }
        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use product_merge_core::ShopDomain;

    use super::*;
    use crate::models::ShopProfile;

    const CALLBACK: &str = "https://merge.example.com/webhooks/app/uninstalled";

    /// Answers listings from a fixed set and records creations.
    #[derive(Default)]
    struct ScriptedSubscriptions {
        existing: Vec<WebhookSubscription>,
        fail_create: bool,
        created: Mutex<Vec<WebhookSubscription>>,
    }

    #[async_trait]
    impl ShopifyApi for ScriptedSubscriptions {
        async fn exchange_code(
            &self,
            _shop: &ShopDomain,
            _code: &str,
        ) -> Result<Credential, ShopifyError> {
            unreachable!("not used by the subscriber")
        }

        async fn fetch_shop_profile(
            &self,
            _credential: &Credential,
        ) -> Result<ShopProfile, ShopifyError> {
            unreachable!("not used by the subscriber")
        }

        async fn list_webhook_subscriptions(
            &self,
            _credential: &Credential,
            topic: WebhookTopic,
        ) -> Result<Vec<WebhookSubscription>, ShopifyError> {
            Ok(self
                .existing
                .iter()
                .filter(|s| s.topic == topic)
                .cloned()
                .collect())
        }

        async fn create_webhook_subscription(
            &self,
            _credential: &Credential,
            subscription: &WebhookSubscription,
        ) -> Result<String, ShopifyError> {
            if self.fail_create {
                return Err(ShopifyError::UserError("Address is invalid".to_string()));
            }
            let mut created = self.created.lock().unwrap();
            created.push(subscription.clone());
            Ok(format!("gid://shopify/WebhookSubscription/{}", created.len()))
        }
    }

    fn credential() -> Credential {
        Credential::new(
            ShopDomain::parse("store.myshopify.com").unwrap(),
            SecretString::from("tok"),
            "",
        )
    }

    #[tokio::test]
    async fn test_existing_subscription_is_not_recreated() {
        let mut present = WebhookSubscription::new(WebhookTopic::AppUninstalled, CALLBACK);
        present.id = Some("gid://shopify/WebhookSubscription/9".to_string());
        let api = Arc::new(ScriptedSubscriptions {
            existing: vec![present],
            ..Default::default()
        });
        let subscriber = WebhookSubscriber::new(api.clone());

        let outcome = subscriber
            .ensure_subscription(&credential(), WebhookTopic::AppUninstalled, CALLBACK)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SubscriptionOutcome::AlreadyPresent {
                id: Some("gid://shopify/WebhookSubscription/9".to_string())
            }
        );
        assert!(api.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_callback_url_still_creates() {
        let api = Arc::new(ScriptedSubscriptions {
            existing: vec![WebhookSubscription::new(
                WebhookTopic::AppUninstalled,
                "https://old.example.com/webhooks/app/uninstalled",
            )],
            ..Default::default()
        });
        let subscriber = WebhookSubscriber::new(api.clone());

        let outcome = subscriber
            .ensure_subscription(&credential(), WebhookTopic::AppUninstalled, CALLBACK)
            .await
            .unwrap();

        assert!(matches!(outcome, SubscriptionOutcome::Created { .. }));
        let created = api.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].callback_url, CALLBACK);
    }

    #[tokio::test]
    async fn test_user_errors_surface_as_subscription_error() {
        let api = Arc::new(ScriptedSubscriptions {
            fail_create: true,
            ..Default::default()
        });
        let subscriber = WebhookSubscriber::new(api);

        let err = subscriber
            .ensure_subscription(&credential(), WebhookTopic::ShopRedact, CALLBACK)
            .await
            .unwrap_err();

        assert_eq!(err.topic, WebhookTopic::ShopRedact);
        assert!(matches!(err.source, ShopifyError::UserError(_)));
    }

    #[tokio::test]
    async fn test_ensure_all_continues_after_failure() {
        let api = Arc::new(ScriptedSubscriptions {
            fail_create: true,
            ..Default::default()
        });
        let subscriber = WebhookSubscriber::new(api);

        let results = subscriber
            .ensure_all(&credential(), &WebhookTopic::ALL, |t| {
                format!("https://merge.example.com/webhooks/{t}")
            })
            .await;

        assert_eq!(results.len(), WebhookTopic::ALL.len());
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }
}
