//! Wire types for Shopify REST and OAuth responses.
//!
//! Kept separate from [`crate::models`] so upstream field names stay here.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::ShopProfile;

/// Body of `POST /admin/oauth/access_token`.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub scope: String,
}

/// Envelope of `GET /admin/api/{version}/shop.json`.
#[derive(Debug, Deserialize)]
pub struct ShopEnvelope {
    pub shop: RestShop,
}

/// The subset of the REST `Shop` resource the app keeps.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RestShop {
    pub name: Option<String>,
    pub email: Option<String>,
    pub shop_owner: Option<String>,
    pub domain: Option<String>,
    pub country_name: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub currency: Option<String>,
    pub money_format: Option<String>,
    pub iana_timezone: Option<String>,
    pub plan_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<RestShop> for ShopProfile {
    fn from(shop: RestShop) -> Self {
        Self {
            contact_email: shop.email.filter(|e| !e.trim().is_empty()),
            owner_name: shop.shop_owner,
            display_name: shop.name,
            domain: shop.domain,
            country: shop.country_name,
            province: shop.province,
            city: shop.city,
            phone: shop.phone,
            currency: shop.currency,
            money_format: shop.money_format,
            timezone: shop.iana_timezone,
            plan_name: shop.plan_name,
            shop_created_at: shop.created_at,
        }
    }
}
