//! GraphQL operations against the Shopify Admin API.
//!
//! Response types are written by hand against the operations in
//! `graphql/admin/queries/`; each operation implements
//! [`GraphQLQuery`] so the client can execute it generically.

use graphql_client::{GraphQLQuery, QueryBody};

const WEBHOOKS_DOCUMENT: &str = include_str!("../../graphql/admin/queries/webhooks.graphql");

// =============================================================================
// webhookSubscriptions
// =============================================================================

pub struct WebhookSubscriptions;

pub mod webhook_subscriptions {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "WebhookSubscriptions";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub first: i64,
        /// GraphQL `WebhookSubscriptionTopic` names.
        pub topics: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub webhook_subscriptions: Connection,
    }

    #[derive(Debug, Deserialize)]
    pub struct Connection {
        pub nodes: Vec<Node>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Node {
        pub id: String,
        pub topic: String,
        pub format: String,
        pub endpoint: Endpoint,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "__typename")]
    pub enum Endpoint {
        WebhookHttpEndpoint {
            #[serde(rename = "callbackUrl")]
            callback_url: String,
        },
        /// Event bridge and Pub/Sub endpoints.
        #[serde(other)]
        Other,
    }
}

impl GraphQLQuery for WebhookSubscriptions {
    type Variables = webhook_subscriptions::Variables;
    type ResponseData = webhook_subscriptions::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: WEBHOOKS_DOCUMENT,
            operation_name: webhook_subscriptions::OPERATION_NAME,
        }
    }
}

// =============================================================================
// webhookSubscriptionCreate
// =============================================================================

pub struct WebhookSubscriptionCreate;

pub mod webhook_subscription_create {
    use serde::{Deserialize, Serialize};

    use crate::models::WebhookFormat;

    pub const OPERATION_NAME: &str = "WebhookSubscriptionCreate";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub topic: String,
        pub webhook_subscription: WebhookSubscriptionInput,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WebhookSubscriptionInput {
        pub callback_url: String,
        pub format: WebhookFormat,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub webhook_subscription_create: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub webhook_subscription: Option<CreatedSubscription>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CreatedSubscription {
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct UserError {
        #[serde(default)]
        pub field: Option<Vec<String>>,
        pub message: String,
    }
}

impl GraphQLQuery for WebhookSubscriptionCreate {
    type Variables = webhook_subscription_create::Variables;
    type ResponseData = webhook_subscription_create::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: WEBHOOKS_DOCUMENT,
            operation_name: webhook_subscription_create::OPERATION_NAME,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::WebhookFormat;

    #[test]
    fn test_document_contains_both_operations() {
        assert!(WEBHOOKS_DOCUMENT.contains("query WebhookSubscriptions("));
        assert!(WEBHOOKS_DOCUMENT.contains("mutation WebhookSubscriptionCreate("));
    }

    #[test]
    fn test_list_response_parses_endpoints() {
        let json = r#"{
            "webhookSubscriptions": {
                "nodes": [
                    {
                        "id": "gid://shopify/WebhookSubscription/1",
                        "topic": "APP_UNINSTALLED",
                        "format": "JSON",
                        "endpoint": {
                            "__typename": "WebhookHttpEndpoint",
                            "callbackUrl": "https://merge.example.com/webhooks/app/uninstalled"
                        }
                    },
                    {
                        "id": "gid://shopify/WebhookSubscription/2",
                        "topic": "APP_UNINSTALLED",
                        "format": "JSON",
                        "endpoint": {
                            "__typename": "WebhookPubSubEndpoint",
                            "pubSubProject": "p",
                            "pubSubTopic": "t"
                        }
                    }
                ]
            }
        }"#;

        let data: webhook_subscriptions::ResponseData = serde_json::from_str(json).unwrap();
        let nodes = &data.webhook_subscriptions.nodes;
        assert_eq!(nodes.len(), 2);
        assert!(matches!(
            &nodes[0].endpoint,
            webhook_subscriptions::Endpoint::WebhookHttpEndpoint { callback_url }
                if callback_url == "https://merge.example.com/webhooks/app/uninstalled"
        ));
        assert!(matches!(
            nodes[1].endpoint,
            webhook_subscriptions::Endpoint::Other
        ));
    }

    #[test]
    fn test_create_variables_serialize() {
        let body = WebhookSubscriptionCreate::build_query(webhook_subscription_create::Variables {
            topic: "SHOP_REDACT".to_string(),
            webhook_subscription: webhook_subscription_create::WebhookSubscriptionInput {
                callback_url: "https://merge.example.com/webhooks/shop/redact".to_string(),
                format: WebhookFormat::Json,
            },
        });

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["operationName"], "WebhookSubscriptionCreate");
        assert_eq!(json["variables"]["topic"], "SHOP_REDACT");
        assert_eq!(
            json["variables"]["webhookSubscription"]["callbackUrl"],
            "https://merge.example.com/webhooks/shop/redact"
        );
        assert_eq!(json["variables"]["webhookSubscription"]["format"], "JSON");
    }

    #[test]
    fn test_create_response_with_user_errors() {
        let json = r#"{
            "webhookSubscriptionCreate": {
                "webhookSubscription": null,
                "userErrors": [{"field": ["webhookSubscription", "callbackUrl"], "message": "Address is invalid"}]
            }
        }"#;

        let data: webhook_subscription_create::ResponseData = serde_json::from_str(json).unwrap();
        let payload = data.webhook_subscription_create.unwrap();
        assert!(payload.webhook_subscription.is_none());
        assert_eq!(payload.user_errors[0].message, "Address is invalid");
    }
}
