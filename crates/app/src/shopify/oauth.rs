//! OAuth authorization code grant helpers.

use product_merge_core::ShopDomain;

/// Build the URL that asks the merchant to approve the app's scopes.
///
/// The merchant is sent back to `redirect_uri` with `code`, `hmac`, and the
/// `state` nonce once they approve.
#[must_use]
pub fn authorization_url(
    shop: &ShopDomain,
    client_id: &str,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
) -> String {
    let scope = scopes.join(",");
    format!(
        "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
        shop,
        urlencoding::encode(client_id),
        urlencoding::encode(&scope),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let shop = ShopDomain::parse("store.myshopify.com").unwrap();
        let url = authorization_url(
            &shop,
            "api-key",
            &["read_products".to_string(), "write_products".to_string()],
            "https://merge.example.com/callback",
            "nonce-1",
        );

        assert_eq!(
            url,
            "https://store.myshopify.com/admin/oauth/authorize?client_id=api-key\
             &scope=read_products%2Cwrite_products\
             &redirect_uri=https%3A%2F%2Fmerge.example.com%2Fcallback\
             &state=nonce-1"
        );
    }
}
