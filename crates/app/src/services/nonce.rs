//! OAuth `state` nonces issued when an install starts.

use std::time::Duration;

use moka::future::Cache;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use product_merge_core::ShopDomain;

/// How long a merchant has to approve the app before the nonce lapses.
const NONCE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on concurrently pending installs.
const MAX_PENDING: u64 = 10_000;

/// Single-use, per-shop OAuth state values.
///
/// Issuing again for the same shop replaces the earlier nonce.
#[derive(Clone)]
pub struct NonceCache {
    cache: Cache<ShopDomain, String>,
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(NONCE_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_PENDING)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Issue a fresh nonce for `shop`.
    pub async fn issue(&self, shop: &ShopDomain) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        self.cache.insert(shop.clone(), nonce.clone()).await;
        nonce
    }

    /// Consume the pending nonce for `shop`, returning whether it matched.
    ///
    /// The pending nonce is removed even on mismatch, so a guessed value
    /// cannot be retried. Values are compared in constant time.
    pub async fn consume(&self, shop: &ShopDomain, state: &str) -> bool {
        // `get` honours the TTL; `remove` alone may hand back a lapsed entry
        let live = self.cache.get(shop).await.is_some();
        let pending = self.cache.remove(shop).await;
        live && pending
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(state.as_bytes())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shop() -> ShopDomain {
        ShopDomain::parse("store.myshopify.com").unwrap()
    }

    #[tokio::test]
    async fn test_nonce_is_single_use() {
        let nonces = NonceCache::new();
        let state = nonces.issue(&shop()).await;

        assert!(nonces.consume(&shop(), &state).await);
        assert!(!nonces.consume(&shop(), &state).await);
    }

    #[tokio::test]
    async fn test_mismatch_discards_nonce() {
        let nonces = NonceCache::new();
        let state = nonces.issue(&shop()).await;

        assert!(!nonces.consume(&shop(), "guess").await);
        assert!(!nonces.consume(&shop(), &state).await);
    }

    #[tokio::test]
    async fn test_prefix_of_nonce_does_not_match() {
        let nonces = NonceCache::new();
        let state = nonces.issue(&shop()).await;
        let (prefix, _) = state.split_at(state.len() - 1);

        assert!(!nonces.consume(&shop(), prefix).await);
        assert!(!nonces.consume(&shop(), &state).await);

        let state = nonces.issue(&shop()).await;
        assert!(!nonces.consume(&shop(), &format!("{state}0")).await);
        assert!(!nonces.consume(&shop(), "").await);
    }

    #[tokio::test]
    async fn test_nonce_is_per_shop() {
        let nonces = NonceCache::new();
        let other = ShopDomain::parse("other.myshopify.com").unwrap();
        let state = nonces.issue(&shop()).await;

        assert!(!nonces.consume(&other, &state).await);
        assert!(nonces.consume(&shop(), &state).await);
    }

    #[tokio::test]
    async fn test_expired_nonce_is_rejected() {
        let nonces = NonceCache::with_ttl(Duration::from_millis(10));
        let state = nonces.issue(&shop()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!nonces.consume(&shop(), &state).await);
    }
}
