//! Integration tests for Product Merge.
//!
//! Tests drive the full router in process with `tower::ServiceExt::oneshot`,
//! backed by [`MemoryShopStore`] and a scripted [`FakeShopify`]. No database
//! or network access is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p product-merge-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `install_flow` - OAuth install handshake end to end
//! - `webhooks` - Signed lifecycle and compliance deliveries
//! - `api_session` - Session-token authenticated embedded API

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header::LOCATION};
use chrono::Utc;
use secrecy::SecretString;
use tower::ServiceExt;

use product_merge_app::config::{AppConfig, ShopifyAppConfig, StoreBackend};
use product_merge_app::db::{MemoryShopStore, ShopStore};
use product_merge_app::models::{Credential, ShopProfile, WebhookSubscription};
use product_merge_app::routes;
use product_merge_app::shopify::session_token::{SessionClaims, sign_session_token};
use product_merge_app::shopify::signature::{sign_install_params, sign_webhook_body};
use product_merge_app::shopify::{ShopifyApi, ShopifyError};
use product_merge_app::state::AppState;
use product_merge_core::{ShopDomain, WebhookTopic};

pub const BASE_URL: &str = "https://merge.example.com";
pub const API_KEY: &str = "3f1c0a9e7d2b4c6a8e0f1d3b5a7c9e2f";
pub const API_SECRET: &str = "shpss_9Kq2mX7vL4nR8tW1zY5bC3dF6gH0jP";
pub const SHOP: &str = "merge-test.myshopify.com";

/// Configuration pointing at the in-memory store.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: BASE_URL.to_string(),
        dashboard_url: None,
        shopify: ShopifyAppConfig {
            api_key: API_KEY.to_string(),
            api_secret: SecretString::from(API_SECRET),
            api_version: "2025-01".to_string(),
            scopes: vec!["read_products".to_string(), "write_products".to_string()],
            http_timeout: Duration::from_secs(5),
        },
        store: StoreBackend::Memory,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

#[must_use]
pub fn shop() -> ShopDomain {
    ShopDomain::parse(SHOP).unwrap()
}

/// Profile the fake returns by default.
#[must_use]
pub fn sample_profile() -> ShopProfile {
    ShopProfile {
        contact_email: Some("owner@merge-test.example".to_string()),
        owner_name: Some("Ada Owner".to_string()),
        display_name: Some("Merge Test".to_string()),
        domain: Some("shop.merge-test.example".to_string()),
        country: Some("US".to_string()),
        currency: Some("USD".to_string()),
        timezone: Some("America/New_York".to_string()),
        plan_name: Some("basic".to_string()),
        ..ShopProfile::default()
    }
}

// ============================================================================
// Scripted Shopify
// ============================================================================

/// What the fake platform answers.
#[derive(Debug)]
pub struct Script {
    /// Access token handed out by the next exchange.
    pub token: String,
    pub scope: String,
    pub exchange_fails: bool,
    pub profile_fails: bool,
    pub profile: ShopProfile,
    /// Topics whose subscription creation is refused.
    pub failing_topics: Vec<WebhookTopic>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            token: "shpat_first_install_token".to_string(),
            scope: "read_products,write_products".to_string(),
            exchange_fails: false,
            profile_fails: false,
            profile: sample_profile(),
            failing_topics: Vec::new(),
        }
    }
}

/// What the fake platform was asked.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub exchanged_codes: Vec<(ShopDomain, String)>,
    pub profile_fetches: usize,
    pub lists: usize,
    /// Subscriptions that exist on the platform side, in creation order.
    pub subscriptions: Vec<WebhookSubscription>,
}

/// In-process stand-in for the Shopify APIs.
#[derive(Debug, Default)]
pub struct FakeShopify {
    script: Mutex<Script>,
    calls: Mutex<Calls>,
}

impl FakeShopify {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the scripted answers.
    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    /// Pre-register a subscription, as if created by an earlier deployment.
    pub fn seed_subscription(&self, subscription: WebhookSubscription) {
        self.calls.lock().unwrap().subscriptions.push(subscription);
    }
}

#[async_trait]
impl ShopifyApi for FakeShopify {
    async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<Credential, ShopifyError> {
        self.calls
            .lock()
            .unwrap()
            .exchanged_codes
            .push((shop.clone(), code.to_string()));

        let script = self.script();
        if script.exchange_fails {
            return Err(ShopifyError::Status {
                status: 400,
                body: "invalid_request: authorization code was not found or was already used"
                    .to_string(),
            });
        }
        Ok(Credential::new(
            shop.clone(),
            SecretString::from(script.token.clone()),
            &script.scope,
        ))
    }

    async fn fetch_shop_profile(
        &self,
        _credential: &Credential,
    ) -> Result<ShopProfile, ShopifyError> {
        self.calls.lock().unwrap().profile_fetches += 1;

        let script = self.script();
        if script.profile_fails {
            return Err(ShopifyError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(script.profile.clone())
    }

    async fn list_webhook_subscriptions(
        &self,
        _credential: &Credential,
        topic: WebhookTopic,
    ) -> Result<Vec<WebhookSubscription>, ShopifyError> {
        let mut calls = self.calls.lock().unwrap();
        calls.lists += 1;
        Ok(calls
            .subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .cloned()
            .collect())
    }

    async fn create_webhook_subscription(
        &self,
        _credential: &Credential,
        subscription: &WebhookSubscription,
    ) -> Result<String, ShopifyError> {
        if self.script().failing_topics.contains(&subscription.topic) {
            return Err(ShopifyError::UserError(
                "Address for this topic has already been taken".to_string(),
            ));
        }

        let mut calls = self.calls.lock().unwrap();
        let id = format!(
            "gid://shopify/WebhookSubscription/{}",
            calls.subscriptions.len() + 1
        );
        calls.subscriptions.push(WebhookSubscription {
            id: Some(id.clone()),
            ..subscription.clone()
        });
        Ok(id)
    }
}

// ============================================================================
// Test application
// ============================================================================

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// The router wired to an in-memory store and a [`FakeShopify`].
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryShopStore>,
    pub shopify: Arc<FakeShopify>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryShopStore::new());
        let shopify = Arc::new(FakeShopify::new());
        let state = AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn ShopStore>,
            Arc::clone(&shopify) as Arc<dyn ShopifyApi>,
        );
        let router = routes::app(state.clone());

        Self {
            state,
            store,
            shopify,
            router,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Start an install and return the `state` nonce from the grant redirect.
    pub async fn begin_install(&self, shop: &str) -> String {
        let response = self.get(&format!("/?shop={shop}")).await;
        assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);

        let location = url::Url::parse(response.location().unwrap()).unwrap();
        location
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    /// Run a complete install: grant redirect, then a signed callback.
    pub async fn install(&self, shop: &str, code: &str) -> TestResponse {
        let state = self.begin_install(shop).await;
        self.get(&format!(
            "/callback?{}",
            callback_query(shop, code, Some(&state))
        ))
        .await
    }
}

// ============================================================================
// Signing helpers
// ============================================================================

/// Encode `params` plus a valid `hmac` as a query string.
#[must_use]
pub fn signed_query(params: &[(&str, &str)]) -> String {
    let mut owned: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let hmac = sign_install_params(&owned, API_SECRET);
    owned.push(("hmac".to_string(), hmac));

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(owned)
        .finish()
}

/// A correctly signed OAuth callback query.
#[must_use]
pub fn callback_query(shop: &str, code: &str, state: Option<&str>) -> String {
    let timestamp = Utc::now().timestamp().to_string();
    let host = "YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvbWVyZ2UtdGVzdA";
    let mut params = vec![
        ("code", code),
        ("host", host),
        ("shop", shop),
        ("timestamp", timestamp.as_str()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    signed_query(&params)
}

/// A signed webhook delivery for `topic`.
#[must_use]
pub fn webhook_request(topic: &str, shop: Option<&str>, body: &str, secret: &str) -> Request<Body> {
    let mut builder = Request::post(format!("/webhooks/{topic}"))
        .header("content-type", "application/json")
        .header("x-shopify-topic", topic)
        .header("x-shopify-webhook-id", "b54557e4-bdd9-4b37-8a5f-bf7d70bcd043")
        .header(
            "x-shopify-hmac-sha256",
            sign_webhook_body(body.as_bytes(), secret),
        );
    if let Some(shop) = shop {
        builder = builder.header("x-shopify-shop-domain", shop);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Claims for a token valid for the next minute.
#[must_use]
pub fn session_claims(shop: &str) -> SessionClaims {
    let now = Utc::now().timestamp();
    SessionClaims {
        iss: format!("https://{shop}/admin"),
        dest: format!("https://{shop}"),
        aud: API_KEY.to_string(),
        sub: Some("42".to_string()),
        exp: now + 60,
        nbf: now - 1,
        iat: now - 1,
        jti: "7a1e3d5c-0000-4000-8000-000000000001".to_string(),
        sid: Some("session-1".to_string()),
    }
}

/// `Authorization` header value carrying a token signed with `secret`.
#[must_use]
pub fn bearer(claims: &SessionClaims, secret: &str) -> String {
    format!("Bearer {}", sign_session_token(claims, secret))
}
