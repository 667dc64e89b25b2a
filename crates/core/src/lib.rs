//! Product Merge Core - Shared types library.
//!
//! This crate provides the domain types shared by the Product Merge components:
//! - `app` - Shopify embedded-app backend (install handshake, webhooks)
//! - `cli` - Command-line tools for migrations and shop management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, shop domains, emails, and webhook topics

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
