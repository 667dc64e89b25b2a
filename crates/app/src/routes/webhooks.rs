//! Webhook receiver.
//!
//! Every delivery is authenticated by an HMAC of the raw body, so the body is
//! taken as bytes and only parsed after verification. The shop is read from
//! the signed body; the `X-Shopify-Shop-Domain` header is unsigned and may
//! only agree with it.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::instrument;

use product_merge_core::{ShopDomain, WebhookTopic};

use crate::error::AppError;
use crate::shopify::signature::verify_webhook_signature;
use crate::state::AppState;

const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
const SHOP_HEADER: &str = "x-shopify-shop-domain";
const TOPIC_HEADER: &str = "x-shopify-topic";
const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

/// Payload fields that identify the shop.
///
/// Compliance payloads carry `shop_domain`; `app/uninstalled` carries the
/// shop resource with `myshopify_domain`.
const SHOP_FIELDS: [&str; 2] = ["shop_domain", "myshopify_domain"];

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/{*topic}", post(receive))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the shop a verified payload is about.
///
/// Fails with 400 when the payload names no valid shop, and with 401 when
/// the shop header names a different one.
fn resolve_shop(headers: &HeaderMap, payload: &Map<String, Value>) -> Result<ShopDomain, AppError> {
    let shop = SHOP_FIELDS
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_str))
        .and_then(|s| ShopDomain::parse(s).ok())
        .ok_or_else(|| AppError::BadRequest("Missing shop domain".to_string()))?;

    if let Some(declared) = header(headers, SHOP_HEADER)
        && ShopDomain::parse(declared).as_ref() != Ok(&shop)
    {
        tracing::warn!(%shop, declared, "Shop header disagrees with signed payload");
        return Err(AppError::Unauthorized(
            "Shop header does not match payload".to_string(),
        ));
    }

    Ok(shop)
}

/// POST /webhooks/{topic} - Receive a webhook delivery.
#[instrument(skip(state, headers, body), fields(webhook_id = tracing::field::Empty))]
async fn receive(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let secret = state.config().shopify.api_secret.expose_secret();
    if !verify_webhook_signature(&body, header(&headers, HMAC_HEADER), secret) {
        tracing::warn!(%topic, "Webhook failed signature verification");
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
    }

    if let Some(id) = header(&headers, WEBHOOK_ID_HEADER) {
        tracing::Span::current().record("webhook_id", id);
    }

    // Anything else signed with the app secret (an install query) is not a delivery
    let payload: Map<String, Value> = serde_json::from_slice(&body).map_err(|_| {
        tracing::warn!(%topic, "Signed webhook body is not a JSON object");
        AppError::BadRequest("Webhook body must be a JSON object".to_string())
    })?;

    let topic: WebhookTopic = topic
        .parse()
        .map_err(|e: product_merge_core::UnknownTopic| AppError::NotFound(e.to_string()))?;

    if let Some(declared) = header(&headers, TOPIC_HEADER)
        && declared != topic.as_str()
    {
        tracing::warn!(%topic, declared, "Topic header disagrees with delivery path");
    }

    let shop = resolve_shop(&headers, &payload)?;

    if topic.removes_shop() {
        let removed = state.store().delete_shop(&shop).await?;
        tracing::info!(%shop, %topic, removed, "Removed shop credential");
    } else {
        // No customer data is stored beyond the shop's own profile
        tracing::info!(
            %shop,
            %topic,
            compliance = topic.is_compliance(),
            "Acknowledged webhook"
        );
    }

    Ok((StatusCode::OK, "ok").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn payload(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_resolve_shop_from_body() {
        let headers = HeaderMap::new();

        let compliance = payload(r#"{"shop_id": 954889, "shop_domain": "store.myshopify.com"}"#);
        assert_eq!(
            resolve_shop(&headers, &compliance).unwrap().as_str(),
            "store.myshopify.com"
        );

        let uninstall = payload(
            r#"{"id": 1, "domain": "shop.example.com", "myshopify_domain": "store.myshopify.com"}"#,
        );
        assert_eq!(
            resolve_shop(&headers, &uninstall).unwrap().as_str(),
            "store.myshopify.com"
        );
    }

    #[test]
    fn test_resolve_shop_accepts_matching_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SHOP_HEADER, HeaderValue::from_static("Store.myshopify.com"));
        let body = payload(r#"{"shop_domain": "store.myshopify.com"}"#);

        assert_eq!(
            resolve_shop(&headers, &body).unwrap().as_str(),
            "store.myshopify.com"
        );
    }

    #[test]
    fn test_resolve_shop_rejects_disagreeing_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SHOP_HEADER, HeaderValue::from_static("victim.myshopify.com"));
        let body = payload(r#"{"shop_domain": "store.myshopify.com"}"#);

        assert!(matches!(
            resolve_shop(&headers, &body),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_resolve_shop_ignores_header_without_body_shop() {
        let mut headers = HeaderMap::new();
        headers.insert(SHOP_HEADER, HeaderValue::from_static("store.myshopify.com"));

        assert!(matches!(
            resolve_shop(&headers, &payload("{}")),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            resolve_shop(&HeaderMap::new(), &payload(r#"{"shop_domain": "evil.example.com"}"#)),
            Err(AppError::BadRequest(_))
        ));
    }
}
