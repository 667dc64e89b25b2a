//! `PgShopStore` against a live database.
//!
//! Run with `DATABASE_URL` set and `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]

use secrecy::{ExposeSecret, SecretString};

use product_merge_app::db::{PgShopStore, ShopStore, create_pool};
use product_merge_app::models::Credential;
use product_merge_core::ShopDomain;

async fn store() -> (PgShopStore, sqlx::PgPool) {
    let url = std::env::var("DATABASE_URL").unwrap();
    let pool = create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../app/migrations").run(&pool).await.unwrap();
    (PgShopStore::new(pool.clone()), pool)
}

fn unique_shop() -> ShopDomain {
    let handle = format!("race-{}", uuid::Uuid::new_v4().simple());
    ShopDomain::parse(&format!("{handle}.myshopify.com")).unwrap()
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_concurrent_installs_leave_one_row() {
    let (store, pool) = store().await;
    let shop = unique_shop();
    let first = Credential::new(shop.clone(), SecretString::from("shpat_first"), "read_products");
    let second = Credential::new(shop.clone(), SecretString::from("shpat_second"), "read_products");

    let (a, b) = tokio::join!(
        store.upsert_shop(&first, None),
        store.upsert_shop(&second, None)
    );
    assert_eq!(a.unwrap(), b.unwrap());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app.shop WHERE shop_domain = $1")
        .bind(shop.as_str())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let stored = store.get_credential(&shop).await.unwrap().unwrap();
    let token = stored.access_token.expose_secret();
    assert!(token == "shpat_first" || token == "shpat_second", "{token}");

    assert!(store.delete_shop(&shop).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_delete_is_idempotent() {
    let (store, _pool) = store().await;
    let shop = unique_shop();
    let credential = Credential::new(shop.clone(), SecretString::from("shpat_x"), "read_products");

    store.upsert_shop(&credential, None).await.unwrap();

    assert!(store.delete_shop(&shop).await.unwrap());
    assert!(!store.delete_shop(&shop).await.unwrap());
    assert!(store.get_credential(&shop).await.unwrap().is_none());
}
