//! Webhook subscription models.

use serde::{Deserialize, Serialize};

use product_merge_core::WebhookTopic;

/// Payload format for webhook deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookFormat {
    #[default]
    Json,
}

/// A webhook subscription on the platform side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    /// Platform ID (`gid://shopify/WebhookSubscription/...`), absent before creation.
    pub id: Option<String>,
    pub topic: WebhookTopic,
    pub callback_url: String,
    pub format: WebhookFormat,
}

impl WebhookSubscription {
    /// A not-yet-created JSON subscription.
    #[must_use]
    pub fn new(topic: WebhookTopic, callback_url: impl Into<String>) -> Self {
        Self {
            id: None,
            topic,
            callback_url: callback_url.into(),
            format: WebhookFormat::Json,
        }
    }

    /// Whether this subscription delivers `topic` to `callback_url`.
    #[must_use]
    pub fn delivers(&self, topic: WebhookTopic, callback_url: &str) -> bool {
        self.topic == topic && self.callback_url == callback_url
    }
}

/// Result of ensuring a subscription exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    /// A matching subscription was already registered; nothing was created.
    AlreadyPresent { id: Option<String> },
    /// A new subscription was created.
    Created { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivers_requires_topic_and_url() {
        let sub = WebhookSubscription::new(
            WebhookTopic::AppUninstalled,
            "https://app.example.com/webhooks/app/uninstalled",
        );

        assert!(sub.delivers(
            WebhookTopic::AppUninstalled,
            "https://app.example.com/webhooks/app/uninstalled"
        ));
        assert!(!sub.delivers(
            WebhookTopic::ShopRedact,
            "https://app.example.com/webhooks/app/uninstalled"
        ));
        assert!(!sub.delivers(
            WebhookTopic::AppUninstalled,
            "https://old.example.com/webhooks/app/uninstalled"
        ));
    }

    #[test]
    fn test_format_serializes_as_graphql_enum() {
        assert_eq!(
            serde_json::to_string(&WebhookFormat::Json).unwrap_or_default(),
            "\"JSON\""
        );
    }
}
