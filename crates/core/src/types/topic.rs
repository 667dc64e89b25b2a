//! Webhook topics the app subscribes to.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A webhook topic name that the app does not handle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown webhook topic: {0}")]
pub struct UnknownTopic(pub String);

/// Lifecycle and compliance webhook topics.
///
/// Topics travel in two spellings: the REST / header form (`app/uninstalled`,
/// used in `X-Shopify-Topic` and in our callback paths) and the GraphQL enum
/// form (`APP_UNINSTALLED`). Serde uses the REST form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookTopic {
    /// The merchant removed the app.
    #[serde(rename = "app/uninstalled")]
    AppUninstalled,
    /// A customer asked the merchant for their stored data.
    #[serde(rename = "customers/data_request")]
    CustomersDataRequest,
    /// A customer's data must be erased.
    #[serde(rename = "customers/redact")]
    CustomersRedact,
    /// All of a shop's data must be erased (sent 48h after uninstall).
    #[serde(rename = "shop/redact")]
    ShopRedact,
}

impl WebhookTopic {
    /// Every topic ensured during install.
    pub const ALL: [Self; 4] = [
        Self::AppUninstalled,
        Self::CustomersDataRequest,
        Self::CustomersRedact,
        Self::ShopRedact,
    ];

    /// REST / header spelling, e.g. `app/uninstalled`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppUninstalled => "app/uninstalled",
            Self::CustomersDataRequest => "customers/data_request",
            Self::CustomersRedact => "customers/redact",
            Self::ShopRedact => "shop/redact",
        }
    }

    /// GraphQL `WebhookSubscriptionTopic` enum value, e.g. `APP_UNINSTALLED`.
    #[must_use]
    pub const fn graphql_name(self) -> &'static str {
        match self {
            Self::AppUninstalled => "APP_UNINSTALLED",
            Self::CustomersDataRequest => "CUSTOMERS_DATA_REQUEST",
            Self::CustomersRedact => "CUSTOMERS_REDACT",
            Self::ShopRedact => "SHOP_REDACT",
        }
    }

    /// Parse the GraphQL enum spelling.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTopic`] for topics this app does not subscribe to.
    pub fn from_graphql_name(name: &str) -> Result<Self, UnknownTopic> {
        Self::ALL
            .into_iter()
            .find(|t| t.graphql_name() == name)
            .ok_or_else(|| UnknownTopic(name.to_owned()))
    }

    /// Whether receipt of this topic removes the shop's stored credential.
    #[must_use]
    pub const fn removes_shop(self) -> bool {
        matches!(self, Self::AppUninstalled | Self::ShopRedact)
    }

    /// Whether this is one of the mandatory privacy compliance topics.
    #[must_use]
    pub const fn is_compliance(self) -> bool {
        matches!(
            self,
            Self::CustomersDataRequest | Self::CustomersRedact | Self::ShopRedact
        )
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookTopic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_owned()))
    }
}
