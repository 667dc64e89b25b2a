//! Domain models for the install handshake.
//!
//! These types sit between the Shopify client (wire formats) and the shop
//! store (rows). Neither side's representation leaks through them.

pub mod shop;
pub mod webhook;

pub use shop::{Credential, ShopProfile, ShopRecord, parse_scopes};
pub use webhook::{SubscriptionOutcome, WebhookFormat, WebhookSubscription};
