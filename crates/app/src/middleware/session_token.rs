//! Session token extractor for embedded API routes.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;

use product_merge_core::ShopDomain;

use crate::shopify::session_token::{SessionClaims, SessionTokenError, verify_session_token};
use crate::state::AppState;

/// Extractor that requires a valid platform session token.
///
/// Reads `Authorization: Bearer <token>` and yields the shop it was issued
/// for.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(SessionShop { shop, .. }: SessionShop) -> impl IntoResponse {
///     shop.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionShop {
    pub shop: ShopDomain,
    pub claims: SessionClaims,
}

/// Error returned when the session token is missing or invalid.
#[derive(Debug)]
pub enum SessionRejection {
    /// No bearer token on the request.
    Missing,
    /// The token failed verification.
    Invalid(SessionTokenError),
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        // Tells App Bridge to fetch a fresh token and retry
        let headers = [("X-Shopify-Retry-Invalid-Session-Request", "1")];
        match self {
            Self::Missing => {
                (StatusCode::UNAUTHORIZED, headers, "Missing session token").into_response()
            }
            Self::Invalid(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                (StatusCode::UNAUTHORIZED, headers, "Invalid session token").into_response()
            }
        }
    }
}

impl FromRequestParts<AppState> for SessionShop {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionRejection::Missing)?;

        let shopify = &state.config().shopify;
        let verified = verify_session_token(
            token,
            &shopify.api_key,
            shopify.api_secret.expose_secret(),
            Utc::now(),
        )
        .map_err(SessionRejection::Invalid)?;

        Ok(Self {
            shop: verified.shop,
            claims: verified.claims,
        })
    }
}
