//! OAuth install handshake, driven through the router.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use secrecy::ExposeSecret;

use product_merge_app::db::ShopStore;
use product_merge_core::{Email, WebhookTopic};
use product_merge_integration_tests::{
    API_KEY, BASE_URL, SHOP, TestApp, callback_query, shop, signed_query,
};

// ============================================================================
// Grant redirect
// ============================================================================

#[tokio::test]
async fn test_begin_install_redirects_to_grant_screen() {
    let app = TestApp::new();

    let response = app.get(&format!("/?shop={SHOP}")).await;

    assert_eq!(response.status, StatusCode::FOUND);
    let location = url::Url::parse(response.location().unwrap()).unwrap();
    assert_eq!(location.host_str(), Some(SHOP));
    assert_eq!(location.path(), "/admin/oauth/authorize");

    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(get("client_id"), Some(API_KEY));
    assert_eq!(get("scope"), Some("read_products,write_products"));
    assert_eq!(get("redirect_uri"), Some(&*format!("{BASE_URL}/callback")));
    assert!(get("state").is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_begin_install_rejects_bad_shop() {
    let app = TestApp::new();

    assert_eq!(app.get("/").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/?shop=evil.example.com").await.status,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_begin_install_verifies_admin_launch_signature() {
    let app = TestApp::new();

    let signed = signed_query(&[("shop", SHOP), ("timestamp", "1700000000")]);
    assert_eq!(app.get(&format!("/?{signed}")).await.status, StatusCode::FOUND);

    let tampered = format!("/?shop={SHOP}&timestamp=1700000000&hmac=deadbeef");
    assert_eq!(app.get(&tampered).await.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Callback
// ============================================================================

#[tokio::test]
async fn test_install_stores_shop_and_registers_webhooks() {
    let app = TestApp::new();

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);
    assert_eq!(
        response.location(),
        Some(&*format!("https://{SHOP}/admin/apps/{API_KEY}"))
    );

    let credential = app.store.get_credential(&shop()).await.unwrap().unwrap();
    assert_eq!(
        credential.access_token.expose_secret(),
        "shpat_first_install_token"
    );
    assert_eq!(credential.scopes, vec!["read_products", "write_products"]);

    let record = app.store.get_shop(&shop()).await.unwrap().unwrap();
    let profile = record.profile.unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Merge Test"));
    assert_eq!(profile.timezone.as_deref(), Some("America/New_York"));

    let owner = app
        .store
        .user_for_email(&Email::parse("owner@merge-test.example").unwrap())
        .await;
    assert!(owner.is_some());
    assert_eq!(record.owner_user_id, owner);

    let calls = app.shopify.calls();
    assert_eq!(calls.exchanged_codes.len(), 1);
    assert_eq!(calls.exchanged_codes[0].1, "code-1");
    assert_eq!(calls.subscriptions.len(), WebhookTopic::ALL.len());
    for topic in WebhookTopic::ALL {
        let sub = calls
            .subscriptions
            .iter()
            .find(|s| s.topic == topic)
            .unwrap();
        assert_eq!(sub.callback_url, format!("{BASE_URL}/webhooks/{topic}"));
    }
}

#[tokio::test]
async fn test_install_honours_configured_dashboard_url() {
    let mut config = product_merge_integration_tests::test_config();
    config.dashboard_url = Some("https://dashboard.merge.example.com".to_string());
    let app = TestApp::with_config(config);

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(
        response.location(),
        Some("https://dashboard.merge.example.com")
    );
}

#[tokio::test]
async fn test_tampered_callback_is_rejected_before_exchange() {
    let app = TestApp::new();
    let state = app.begin_install(SHOP).await;

    let query = callback_query(SHOP, "code-1", Some(&state)).replace("code-1", "code-2");
    let response = app.get(&format!("/callback?{query}")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.shopify.calls().exchanged_codes.is_empty());
    assert_eq!(app.store.shop_count().await, 0);
}

#[tokio::test]
async fn test_callback_missing_parameters_is_bad_request() {
    let app = TestApp::new();

    let no_code = signed_query(&[("shop", SHOP), ("timestamp", "1700000000")]);
    let response = app.get(&format!("/callback?{no_code}")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let no_hmac = format!("/callback?code=abc&shop={SHOP}&timestamp=1700000000");
    assert_eq!(app.get(&no_hmac).await.status, StatusCode::BAD_REQUEST);

    assert!(app.shopify.calls().exchanged_codes.is_empty());
}

#[tokio::test]
async fn test_callback_with_foreign_shop_is_bad_request() {
    let app = TestApp::new();

    let query = callback_query("evil.example.com", "code-1", None);
    let response = app.get(&format!("/callback?{query}")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.shopify.calls().exchanged_codes.is_empty());
}

#[tokio::test]
async fn test_unknown_state_is_rejected() {
    let app = TestApp::new();
    app.begin_install(SHOP).await;

    let query = callback_query(SHOP, "code-1", Some("not-the-issued-nonce"));
    let response = app.get(&format!("/callback?{query}")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.shopify.calls().exchanged_codes.is_empty());
}

#[tokio::test]
async fn test_replayed_callback_exchanges_once() {
    let app = TestApp::new();
    let state = app.begin_install(SHOP).await;
    let uri = format!("/callback?{}", callback_query(SHOP, "code-1", Some(&state)));

    assert_eq!(app.get(&uri).await.status, StatusCode::FOUND);
    assert_eq!(app.get(&uri).await.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.shopify.calls().exchanged_codes.len(), 1);
}

#[tokio::test]
async fn test_callback_without_state_is_accepted() {
    let app = TestApp::new();

    let query = callback_query(SHOP, "code-1", None);
    let response = app.get(&format!("/callback?{query}")).await;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(app.store.shop_count().await, 1);
}

#[tokio::test]
async fn test_failed_exchange_stores_nothing_and_hides_detail() {
    let app = TestApp::new();
    app.shopify.script().exchange_fails = true;

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.body.contains("invalid_request"));
    assert_eq!(app.store.shop_count().await, 0);
    assert_eq!(app.shopify.calls().profile_fetches, 0);
    assert!(app.shopify.calls().subscriptions.is_empty());
}

#[tokio::test]
async fn test_profile_failure_still_installs() {
    let app = TestApp::new();
    app.shopify.script().profile_fails = true;

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(response.status, StatusCode::FOUND);
    let record = app.store.get_shop(&shop()).await.unwrap().unwrap();
    assert!(record.profile.is_none());
    assert!(record.owner_user_id.is_none());
    assert_eq!(
        app.shopify.calls().subscriptions.len(),
        WebhookTopic::ALL.len()
    );
}

#[tokio::test]
async fn test_subscription_failure_does_not_fail_install() {
    let app = TestApp::new();
    app.shopify.script().failing_topics = vec![WebhookTopic::CustomersRedact];

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(app.store.shop_count().await, 1);

    let topics: Vec<WebhookTopic> = app
        .shopify
        .calls()
        .subscriptions
        .iter()
        .map(|s| s.topic)
        .collect();
    assert_eq!(topics.len(), WebhookTopic::ALL.len() - 1);
    assert!(!topics.contains(&WebhookTopic::CustomersRedact));
}

#[tokio::test]
async fn test_reinstall_overwrites_credential_without_duplicate_webhooks() {
    let app = TestApp::new();

    assert_eq!(app.install(SHOP, "code-1").await.status, StatusCode::FOUND);
    let first = app.store.get_shop(&shop()).await.unwrap().unwrap();

    app.shopify.script().token = "shpat_second_install_token".to_string();
    app.shopify.script().scope = "read_products".to_string();
    assert_eq!(app.install(SHOP, "code-2").await.status, StatusCode::FOUND);

    assert_eq!(app.store.shop_count().await, 1);
    let second = app.store.get_shop(&shop()).await.unwrap().unwrap();
    assert_eq!(first.id, second.id);

    let credential = app.store.get_credential(&shop()).await.unwrap().unwrap();
    assert_eq!(
        credential.access_token.expose_secret(),
        "shpat_second_install_token"
    );
    assert_eq!(credential.scopes, vec!["read_products"]);

    let calls = app.shopify.calls();
    assert_eq!(calls.exchanged_codes.len(), 2);
    assert_eq!(calls.subscriptions.len(), WebhookTopic::ALL.len());
}

#[tokio::test]
async fn test_subscription_for_other_url_is_not_reused() {
    let app = TestApp::new();
    app.shopify.seed_subscription(product_merge_app::models::WebhookSubscription {
        id: Some("gid://shopify/WebhookSubscription/900".to_string()),
        ..product_merge_app::models::WebhookSubscription::new(
            WebhookTopic::AppUninstalled,
            "https://old-deploy.example.com/webhooks/app/uninstalled",
        )
    });

    app.install(SHOP, "code-1").await;

    let uninstall_subs = app
        .shopify
        .calls()
        .subscriptions
        .into_iter()
        .filter(|s| s.topic == WebhookTopic::AppUninstalled)
        .count();
    assert_eq!(uninstall_subs, 2);
}

#[tokio::test]
async fn test_exchanged_token_is_persisted_verbatim() {
    let app = TestApp::new();
    app.shopify.script().token = "tok123".to_string();

    let response = app.install(SHOP, "code-1").await;

    assert_eq!(response.status, StatusCode::FOUND);
    let credential = app.store.get_credential(&shop()).await.unwrap().unwrap();
    assert_eq!(credential.access_token.expose_secret(), "tok123");
}
