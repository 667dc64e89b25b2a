//! Session token verification for requests from the embedded frontend.
//!
//! The platform issues the embedded app a short-lived HS256 JWT signed with
//! the app's API secret. The frontend sends it as `Authorization: Bearer`,
//! and the `dest` claim names the shop the merchant is signed in to.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use product_merge_core::ShopDomain;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew tolerated on `exp` and `nbf`, in seconds.
const LEEWAY_SECS: i64 = 5;

/// Reasons a session token is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("malformed session token")]
    Malformed,
    #[error("unsupported signing algorithm: {0}")]
    Algorithm(String),
    #[error("session token signature mismatch")]
    Signature,
    #[error("session token expired")]
    Expired,
    #[error("session token not yet valid")]
    NotYetValid,
    #[error("session token issued for another app")]
    Audience,
    #[error("session token destination is not a shop: {0}")]
    Destination(String),
    #[error("session token issuer does not match destination")]
    Issuer,
}

/// Registered claims of a platform session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// `https://{shop}/admin`
    pub iss: String,
    /// `https://{shop}`
    pub dest: String,
    /// The app's API key.
    pub aud: String,
    /// Staff user ID, absent for some app-initiated tokens.
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default)]
    pub sid: Option<String>,
}

/// A verified session token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub shop: ShopDomain,
    pub claims: SessionClaims,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Verify a session token and resolve the shop it was issued for.
///
/// # Errors
///
/// Returns a [`SessionTokenError`] describing the first check that failed.
pub fn verify_session_token(
    token: &str,
    api_key: &str,
    api_secret: &str,
    now: DateTime<Utc>,
) -> Result<SessionToken, SessionTokenError> {
    let mut parts = token.trim().split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionTokenError::Malformed);
    };

    let header: Header = decode_segment(header_b64)?;
    if header.alg != "HS256" {
        return Err(SessionTokenError::Algorithm(header.alg));
    }

    let signature = BASE64URL
        .decode(signature_b64)
        .map_err(|_| SessionTokenError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|_| SessionTokenError::Signature)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| SessionTokenError::Signature)?;

    let claims: SessionClaims = decode_segment(claims_b64)?;

    let now = now.timestamp();
    if claims.exp + LEEWAY_SECS <= now {
        return Err(SessionTokenError::Expired);
    }
    if claims.nbf - LEEWAY_SECS > now {
        return Err(SessionTokenError::NotYetValid);
    }
    if claims.aud != api_key {
        return Err(SessionTokenError::Audience);
    }

    let shop = ShopDomain::from_origin(&claims.dest)
        .map_err(|_| SessionTokenError::Destination(claims.dest.clone()))?;
    if ShopDomain::from_origin(claims.iss.trim_end_matches("/admin")).as_ref() != Ok(&shop) {
        return Err(SessionTokenError::Issuer);
    }

    Ok(SessionToken { shop, claims })
}

/// Encode and sign claims the way the platform does.
///
/// Used by tests and local tooling to mint tokens.
#[must_use]
pub fn sign_session_token(claims: &SessionClaims, api_secret: &str) -> String {
    let header = Header {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_b64 = BASE64URL.encode(serde_json::to_vec(&header).unwrap_or_default());
    let claims_b64 = BASE64URL.encode(serde_json::to_vec(claims).unwrap_or_default());

    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    let signature_b64 = BASE64URL.encode(mac.finalize().into_bytes());

    format!("{header_b64}.{claims_b64}.{signature_b64}")
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, SessionTokenError> {
    let bytes = BASE64URL
        .decode(segment)
        .map_err(|_| SessionTokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| SessionTokenError::Malformed)
}
