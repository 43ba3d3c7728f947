//! Logs what would be sent and returns a synthetic message id. Used in
//! development and in tests so the outbox worker can be exercised without
//! a real WhatsApp Business account.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{Provider, ProviderError};

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyProvider;

#[async_trait]
impl Provider for DummyProvider {
    async fn send(
        &self,
        sender_phone_number_id: &str,
        phone_e164: &str,
        text: &str,
    ) -> Result<String, ProviderError> {
        let message_id = format!("dummy-{}", Uuid::now_v7());
        info!(
            sender_phone_number_id,
            phone_e164, message_id, "dummy provider send (not actually delivered): {text}"
        );
        Ok(message_id)
    }
}
