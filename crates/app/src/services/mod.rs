//! Install and webhook lifecycle services.

pub mod install;
pub mod nonce;
pub mod webhooks;

pub use install::{
    ExchangeError, InstallError, InstallHandshake, InstallOutcome, InstallRequest, InstallStage,
};
pub use nonce::NonceCache;
pub use webhooks::{SubscriptionError, WebhookSubscriber};
