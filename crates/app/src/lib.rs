//! Product Merge App library.
//!
//! The backend half of a Shopify embedded app: it completes the OAuth
//! install handshake, stores each shop's offline access token, keeps the
//! mandatory lifecycle and compliance webhooks registered, and serves the
//! embedded frontend's API.
//!
//! # Security
//!
//! This crate holds HIGH PRIVILEGE secrets:
//! - The app's API secret (verifies every callback, webhook, and session token)
//! - Per-shop Admin API access tokens
//!
//! Neither is ever logged; both are held as `SecretString`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
