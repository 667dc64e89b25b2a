//! Shop credential and profile models.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use product_merge_core::{ShopDomain, ShopId, UserId};

/// A durable Admin API credential for one shop.
///
/// At most one credential exists per shop domain. Reinstalling overwrites it,
/// uninstalling deletes it.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct Credential {
    /// Shop domain the token is valid for.
    pub shop: ShopDomain,
    /// Offline access token (HIGH PRIVILEGE - redacted in debug output).
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// When the token was issued to us.
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential issued now.
    #[must_use]
    pub fn new(shop: ShopDomain, access_token: SecretString, scope: &str) -> Self {
        Self {
            shop,
            access_token,
            scopes: parse_scopes(scope),
            issued_at: Utc::now(),
        }
    }

    /// Scopes in the comma-separated form the platform uses.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(",")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Split a comma-separated scope string, dropping blanks.
#[must_use]
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Snapshot of the merchant's shop settings, fetched right after the token
/// exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShopProfile {
    pub contact_email: Option<String>,
    pub owner_name: Option<String>,
    pub display_name: Option<String>,
    /// Primary (possibly custom) storefront domain.
    pub domain: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub currency: Option<String>,
    pub money_format: Option<String>,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: Option<String>,
    pub plan_name: Option<String>,
    /// When the shop itself was created on the platform.
    pub shop_created_at: Option<DateTime<Utc>>,
}

/// A persisted shop as read back from the store.
///
/// Carries no access token; use `ShopStore::get_credential` for that.
#[derive(Debug, Clone, Serialize)]
pub struct ShopRecord {
    pub id: ShopId,
    pub shop: ShopDomain,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub owner_user_id: Option<UserId>,
    /// `None` until a profile fetch has succeeded for this shop.
    pub profile: Option<ShopProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
