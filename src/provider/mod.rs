//! The one-method capability boundary to the outside chat provider. Kept
//! intentionally narrow so a new channel (SMS, a different WhatsApp BSP)
//! is a new implementation, not a new core code path.

pub mod dummy;
pub mod meta_cloud;

use async_trait::async_trait;

pub use dummy::DummyProvider;
pub use meta_cloud::{MetaCloudOptions, MetaCloudProvider};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider send failed: {0}")]
    Send(String),
}

impl ProviderError {
    /// Whether this failure is the Meta access-token-expired signal the
    /// outbox worker treats specially (requeue + optional worker halt)
    /// rather than a generic transient send failure.
    pub fn is_token_expired(&self) -> bool {
        let ProviderError::Send(msg) = self;
        let lower = msg.to_ascii_lowercase();
        lower.contains("access token") && lower.contains("expired")
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Sends `text` to `phone_e164` from the identity named by
    /// `sender_phone_number_id`, returning the provider-assigned message id.
    async fn send(
        &self,
        sender_phone_number_id: &str,
        phone_e164: &str,
        text: &str,
    ) -> Result<String, ProviderError>;
}
