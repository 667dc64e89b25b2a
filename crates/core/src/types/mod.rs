//! Core types for Product Merge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod shop_domain;
pub mod topic;

pub use email::{Email, EmailError};
pub use id::*;
pub use shop_domain::{ShopDomain, ShopDomainError};
pub use topic::{UnknownTopic, WebhookTopic};
