//! HMAC-SHA256 verification of requests signed with the app's API secret.
//!
//! Two encodings are in play:
//! - Install and OAuth callback queries carry a hex digest in the `hmac`
//!   query parameter, computed over the remaining parameters.
//! - Webhook deliveries carry a base64 digest of the raw body in the
//!   `X-Shopify-Hmac-Sha256` header.
//!
//! Both verifiers are pure, compare in constant time, and return `false` for
//! anything malformed.

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters excluded from the signed message.
const UNSIGNED_PARAMS: [&str; 2] = ["hmac", "signature"];

/// Build the message the platform signs for an install query.
///
/// Keys are sorted byte-wise; a key that appears more than once contributes
/// one `key=v1,v2` entry with its values in arrival order.
#[must_use]
pub fn canonical_install_message(params: &[(String, String)]) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in params {
        if UNSIGNED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        grouped.entry(key.as_str()).or_default().push(value.as_str());
    }

    grouped
        .into_iter()
        .map(|(key, values)| format!("{key}={}", values.join(",")))
        .collect::<Vec<_>>()
        .join("&")
}

/// Verify the `hmac` parameter of a decoded install query.
///
/// Fails closed when `hmac` is missing, repeated, not hex, or the wrong length.
#[must_use]
pub fn verify_install_signature(params: &[(String, String)], secret: &str) -> bool {
    let mut supplied = params.iter().filter(|(k, _)| k == "hmac").map(|(_, v)| v);
    let (Some(supplied), None) = (supplied.next(), supplied.next()) else {
        return false;
    };

    let Ok(expected) = hex::decode(supplied) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(canonical_install_message(params).as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Verify a webhook body against its `X-Shopify-Hmac-Sha256` header.
///
/// The digest must be computed over the exact bytes received; re-serialized
/// JSON will not match.
#[must_use]
pub fn verify_webhook_signature(raw_body: &[u8], header: Option<&str>, secret: &str) -> bool {
    let Some(header) = header else {
        return false;
    };

    let Ok(expected) = BASE64.decode(header.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC of an install query, as the platform would compute it.
///
/// Used by tooling and tests that need to produce signed callbacks.
#[must_use]
pub fn sign_install_params(params: &[(String, String)], secret: &str) -> String {
    hex::encode(digest(secret, canonical_install_message(params).as_bytes()))
}

/// Base64 HMAC of a webhook body, as the platform would compute it.
#[must_use]
pub fn sign_webhook_body(raw_body: &[u8], secret: &str) -> String {
    BASE64.encode(digest(secret, raw_body))
}

fn digest(secret: &str, message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}
