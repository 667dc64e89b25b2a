//! OAuth install routes.
//!
//! `GET /` sends the merchant to the grant screen with a fresh `state`
//! nonce; `GET /callback` runs the [`InstallHandshake`]. Both read the raw
//! query so the signature is checked against exactly what was sent.

use axum::{
    Router,
    extract::{RawQuery, State},
    response::Response,
    routing::get,
};
use secrecy::ExposeSecret;
use tracing::instrument;

use product_merge_core::ShopDomain;

use crate::error::AppError;
use crate::services::InstallHandshake;
use crate::services::install::parse_query;
use crate::shopify::oauth::authorization_url;
use crate::shopify::signature::verify_install_signature;
use crate::state::AppState;

use super::found;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(begin_install))
        .route("/callback", get(callback))
}

/// GET / - Start an install.
///
/// Launches from the admin carry an `hmac`, which must verify. A bare
/// `?shop=` (typed install link) is allowed through, since the callback is
/// verified regardless.
#[instrument(skip(state, query))]
async fn begin_install(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_query(query.as_deref().unwrap_or_default());
    let config = state.config();

    let shop_param = params
        .iter()
        .find(|(k, _)| k == "shop")
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| AppError::BadRequest("Missing shop parameter".to_string()))?;

    let shop = ShopDomain::parse(shop_param)
        .map_err(|e| AppError::BadRequest(format!("Invalid shop parameter: {e}")))?;

    if params.iter().any(|(k, _)| k == "hmac")
        && !verify_install_signature(&params, config.shopify.api_secret.expose_secret())
    {
        tracing::warn!(%shop, "Install launch failed signature verification");
        return Err(AppError::Unauthorized("Invalid signature".to_string()));
    }

    let nonce = state.nonces().issue(&shop).await;
    let url = authorization_url(
        &shop,
        &config.shopify.api_key,
        &config.shopify.scopes,
        &config.oauth_redirect_uri(),
        &nonce,
    );

    tracing::info!(%shop, "Redirecting to OAuth grant screen");
    Ok(found(&url))
}

/// GET /callback - Complete an install.
#[instrument(skip(state, query))]
async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_query(query.as_deref().unwrap_or_default());

    let outcome = InstallHandshake::new(
        state.config(),
        state.store(),
        state.shopify(),
        state.nonces(),
    )
    .run(params)
    .await?;

    Ok(found(&outcome.redirect_url))
}
