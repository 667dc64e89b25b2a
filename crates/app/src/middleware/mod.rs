//! Request extractors.
//!
//! Install and webhook routes authenticate by HMAC inside their handlers,
//! since the signature covers the raw query or body. Embedded API routes
//! authenticate with [`SessionShop`].

pub mod session_token;

pub use session_token::{SessionRejection, SessionShop};
