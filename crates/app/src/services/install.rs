//! The OAuth install handshake.
//!
//! Each callback runs a fresh [`InstallHandshake`], which walks
//!
//! ```text
//! AwaitingCallback -> SignatureVerified -> TokenExchanged -> ProfileFetched
//!     -> Persisted -> WebhooksEnsured -> Complete
//! ```
//!
//! or stops in `Rejected`. A credential is only ever exchanged, stored, or
//! used after the callback's signature has been verified.

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use product_merge_core::{ShopDomain, ShopId, WebhookTopic};

use crate::config::AppConfig;
use crate::db::{RepositoryError, ShopStore};
use crate::models::SubscriptionOutcome;
use crate::services::nonce::NonceCache;
use crate::services::webhooks::{SubscriptionError, WebhookSubscriber};
use crate::shopify::signature::verify_install_signature;
use crate::shopify::{ShopifyApi, ShopifyError};

/// Progress of one install callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    AwaitingCallback,
    SignatureVerified,
    TokenExchanged,
    ProfileFetched,
    Persisted,
    WebhooksEnsured,
    Complete,
    Rejected,
}

impl InstallStage {
    /// Terminal stages are never left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Rejected)
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingCallback, Self::SignatureVerified | Self::Rejected)
                | (Self::SignatureVerified, Self::TokenExchanged | Self::Rejected)
                | (Self::TokenExchanged, Self::ProfileFetched)
                | (Self::ProfileFetched, Self::Persisted | Self::Rejected)
                | (Self::Persisted, Self::WebhooksEnsured)
                | (Self::WebhooksEnsured, Self::Complete)
        )
    }
}

/// The authorization code could not be traded for a credential.
#[derive(Debug, Error)]
#[error("token exchange for {shop} failed: {source}")]
pub struct ExchangeError {
    pub shop: ShopDomain,
    #[source]
    pub source: ShopifyError,
}

/// Why an install callback was rejected.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Missing or malformed parameters, or an unknown OAuth state.
    #[error("invalid install request: {0}")]
    Validation(String),

    /// The callback's HMAC did not verify.
    #[error("install signature verification failed")]
    SignatureInvalid,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("failed to persist shop: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Decode a raw query string into its parameter pairs, preserving order and
/// repeats.
#[must_use]
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

/// The parameters of an OAuth callback, before verification.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub shop: ShopDomain,
    pub code: String,
    pub timestamp: String,
    pub host: Option<String>,
    pub state: Option<String>,
    /// Every parameter as received, for signature verification.
    pub params: Vec<(String, String)>,
}

impl InstallRequest {
    /// Extract the callback parameters.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::Validation` if `shop`, `code`, `hmac`, or
    /// `timestamp` is missing or repeated, or the shop domain is invalid.
    pub fn from_params(params: Vec<(String, String)>) -> Result<Self, InstallError> {
        let shop = required(&params, "shop")?;
        let code = required(&params, "code")?.to_string();
        required(&params, "hmac")?;
        let timestamp = required(&params, "timestamp")?.to_string();
        let host = single(&params, "host")?.map(String::from);
        let state = single(&params, "state")?.map(String::from);

        let shop = ShopDomain::parse(shop)
            .map_err(|e| InstallError::Validation(format!("shop: {e}")))?;

        Ok(Self {
            shop,
            code,
            timestamp,
            host,
            state,
            params,
        })
    }
}

fn single<'a>(
    params: &'a [(String, String)],
    key: &str,
) -> Result<Option<&'a str>, InstallError> {
    let mut values = params
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str());
    match (values.next(), values.next()) {
        (first, None) => Ok(first.filter(|v| !v.is_empty())),
        (_, Some(_)) => Err(InstallError::Validation(format!(
            "parameter {key} given more than once"
        ))),
    }
}

fn required<'a>(params: &'a [(String, String)], key: &str) -> Result<&'a str, InstallError> {
    single(params, key)?
        .ok_or_else(|| InstallError::Validation(format!("missing parameter {key}")))
}

/// Everything the merchant's browser needs after a successful install.
#[derive(Debug)]
pub struct InstallOutcome {
    pub shop_id: ShopId,
    pub shop: ShopDomain,
    pub redirect_url: String,
    /// `false` when the shop was stored without a profile snapshot.
    pub profile_fetched: bool,
    pub subscriptions: Vec<(WebhookTopic, Result<SubscriptionOutcome, SubscriptionError>)>,
}

impl InstallOutcome {
    /// Topics that could not be ensured and need an operator re-run.
    #[must_use]
    pub fn failed_topics(&self) -> Vec<WebhookTopic> {
        self.subscriptions
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(t, _)| *t)
            .collect()
    }
}

/// One run of the install state machine.
///
/// Consumed by [`InstallHandshake::run`], so a finished handshake cannot be
/// resumed.
pub struct InstallHandshake<'a> {
    stage: InstallStage,
    config: &'a AppConfig,
    store: &'a dyn ShopStore,
    shopify: Arc<dyn ShopifyApi>,
    nonces: &'a NonceCache,
}

impl<'a> InstallHandshake<'a> {
    #[must_use]
    pub fn new(
        config: &'a AppConfig,
        store: &'a dyn ShopStore,
        shopify: Arc<dyn ShopifyApi>,
        nonces: &'a NonceCache,
    ) -> Self {
        Self {
            stage: InstallStage::AwaitingCallback,
            config,
            store,
            shopify,
            nonces,
        }
    }

    fn advance(&mut self, next: InstallStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal install transition {:?} -> {next:?}",
            self.stage
        );
        tracing::debug!(from = ?self.stage, to = ?next, "Install stage");
        self.stage = next;
    }

    fn reject(&mut self, error: InstallError) -> InstallError {
        self.advance(InstallStage::Rejected);
        error
    }

    /// Drive the handshake to `Complete` or `Rejected`.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing/invalid parameters or an unknown OAuth state
    /// - `SignatureInvalid` if the HMAC does not verify
    /// - `Exchange` if the authorization code could not be traded
    /// - `Persistence` if the shop could not be stored
    ///
    /// Profile and webhook failures are not errors; they are reported on the
    /// [`InstallOutcome`].
    #[instrument(skip_all, fields(shop = tracing::field::Empty))]
    pub async fn run(mut self, params: Vec<(String, String)>) -> Result<InstallOutcome, InstallError> {
        // AwaitingCallback
        let request = match InstallRequest::from_params(params) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let shop = request.shop.clone();
        tracing::Span::current().record("shop", tracing::field::display(&shop));

        let secret = self.config.shopify.api_secret.expose_secret();
        if !verify_install_signature(&request.params, secret) {
            tracing::warn!(%shop, "Install callback failed signature verification");
            return Err(self.reject(InstallError::SignatureInvalid));
        }
        self.advance(InstallStage::SignatureVerified);

        if let Some(state) = &request.state
            && !self.nonces.consume(&shop, state).await
        {
            tracing::warn!(%shop, "Install callback carried an unknown OAuth state");
            return Err(self.reject(InstallError::Validation(
                "unknown or expired state".to_string(),
            )));
        }

        let credential = match self.shopify.exchange_code(&shop, &request.code).await {
            Ok(credential) => credential,
            Err(source) => {
                tracing::error!(%shop, error = %source, timeout = source.is_timeout(), "Token exchange failed");
                return Err(self.reject(InstallError::Exchange(ExchangeError {
                    shop,
                    source,
                })));
            }
        };
        self.advance(InstallStage::TokenExchanged);

        let profile = match self.shopify.fetch_shop_profile(&credential).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(%shop, error = %e, "Shop profile fetch failed; storing credential only");
                None
            }
        };
        self.advance(InstallStage::ProfileFetched);

        let shop_id = match self.store.upsert_shop(&credential, profile.as_ref()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(%shop, error = %e, "Failed to persist shop");
                return Err(self.reject(InstallError::Persistence(e)));
            }
        };
        self.advance(InstallStage::Persisted);

        let subscriber = WebhookSubscriber::new(Arc::clone(&self.shopify));
        let subscriptions = subscriber
            .ensure_all(&credential, &WebhookTopic::ALL, |topic| {
                self.config.webhook_callback_url(topic)
            })
            .await;
        self.advance(InstallStage::WebhooksEnsured);

        let outcome = InstallOutcome {
            shop_id,
            redirect_url: self.config.dashboard_url(&shop),
            shop,
            profile_fetched: profile.is_some(),
            subscriptions,
        };
        self.advance(InstallStage::Complete);

        let failed = outcome.failed_topics();
        if failed.is_empty() {
            tracing::info!(shop = %outcome.shop, shop_id = %outcome.shop_id, "Install complete");
        } else {
            tracing::warn!(
                shop = %outcome.shop,
                failed = ?failed,
                "Install complete with missing webhook subscriptions"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL_STAGES: [InstallStage; 8] = [
        InstallStage::AwaitingCallback,
        InstallStage::SignatureVerified,
        InstallStage::TokenExchanged,
        InstallStage::ProfileFetched,
        InstallStage::Persisted,
        InstallStage::WebhooksEnsured,
        InstallStage::Complete,
        InstallStage::Rejected,
    ];

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_happy_path_transitions() {
        for window in ALL_STAGES[..7].windows(2) {
            assert!(
                window[0].can_advance_to(window[1]),
                "{:?} -> {:?}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_rejection_only_before_persisting() {
        let can_reject: Vec<InstallStage> = ALL_STAGES
            .into_iter()
            .filter(|s| s.can_advance_to(InstallStage::Rejected))
            .collect();
        assert_eq!(
            can_reject,
            vec![
                InstallStage::AwaitingCallback,
                InstallStage::SignatureVerified,
                InstallStage::ProfileFetched,
            ]
        );
    }

    #[test]
    fn test_terminal_stages_have_no_successors() {
        for terminal in [InstallStage::Complete, InstallStage::Rejected] {
            assert!(terminal.is_terminal());
            assert!(ALL_STAGES.iter().all(|&next| !terminal.can_advance_to(next)));
        }
    }

    #[test]
    fn test_no_skipping_signature_verification() {
        assert!(!InstallStage::AwaitingCallback.can_advance_to(InstallStage::TokenExchanged));
        assert!(!InstallStage::AwaitingCallback.can_advance_to(InstallStage::Persisted));
    }

    #[test]
    fn test_request_requires_core_params() {
        let full = [
            ("shop", "store.myshopify.com"),
            ("code", "abc"),
            ("hmac", "00"),
            ("timestamp", "1700000000"),
        ];
        assert!(InstallRequest::from_params(pairs(&full)).is_ok());

        for missing in ["shop", "code", "hmac", "timestamp"] {
            let partial: Vec<(&str, &str)> =
                full.iter().copied().filter(|(k, _)| *k != missing).collect();
            assert!(
                matches!(
                    InstallRequest::from_params(pairs(&partial)),
                    Err(InstallError::Validation(_))
                ),
                "missing {missing} should be rejected"
            );
        }
    }

    #[test]
    fn test_request_rejects_bad_shop_and_repeats() {
        let bad_shop = pairs(&[
            ("shop", "evil.example.com"),
            ("code", "abc"),
            ("hmac", "00"),
            ("timestamp", "1"),
        ]);
        assert!(matches!(
            InstallRequest::from_params(bad_shop),
            Err(InstallError::Validation(_))
        ));

        let repeated = pairs(&[
            ("shop", "store.myshopify.com"),
            ("shop", "other.myshopify.com"),
            ("code", "abc"),
            ("hmac", "00"),
            ("timestamp", "1"),
        ]);
        assert!(matches!(
            InstallRequest::from_params(repeated),
            Err(InstallError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_query_decodes() {
        let params = parse_query("shop=store.myshopify.com&host=YWRtaW4%3D&state=a+b");
        assert_eq!(
            params,
            pairs(&[
                ("shop", "store.myshopify.com"),
                ("host", "YWRtaW4="),
                ("state", "a b"),
            ])
        );
    }
}
