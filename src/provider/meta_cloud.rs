//! Meta Cloud API (WhatsApp Business) HTTP provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Provider, ProviderError};

const SEND_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct MetaCloudOptions {
    pub access_token: String,
    pub graph_url: String,
    pub api_version: String,
    /// When false, requests are built and logged but not actually issued —
    /// mirrors the original's `allow_real_send` guard for staging.
    pub allow_real_send: bool,
}

#[derive(Debug, Clone)]
pub struct MetaCloudProvider {
    client: reqwest::Client,
    options: MetaCloudOptions,
}

impl MetaCloudProvider {
    pub fn new(options: MetaCloudOptions) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");

        Self { client, options }
    }
}

#[derive(Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text: TextBody<'a>,
}

#[derive(Deserialize)]
struct SendResponseMessage {
    id: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SendResponseMessage>,
    #[serde(default)]
    error: Option<SendResponseError>,
}

#[derive(Deserialize)]
struct SendResponseError {
    message: String,
}

fn digits_only(phone_e164: &str) -> String {
    phone_e164.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl Provider for MetaCloudProvider {
    async fn send(
        &self,
        sender_phone_number_id: &str,
        phone_e164: &str,
        text: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/{}/{}/messages",
            self.options.graph_url, self.options.api_version, sender_phone_number_id
        );

        let body = SendRequest {
            messaging_product: "whatsapp",
            to: &digits_only(phone_e164),
            kind: "text",
            text: TextBody {
                preview_url: false,
                body: text,
            },
        };

        if !self.options.allow_real_send {
            return Ok(format!("unsent-{}", uuid::Uuid::now_v7()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.options.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Send(err.to_string()))?;

        let status = response.status();
        let payload: SendResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Send(format!("invalid provider response: {err}")))?;

        if !status.is_success() {
            let message = payload
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("provider returned status {status}"));
            return Err(ProviderError::Send(message));
        }

        payload
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| ProviderError::Send("provider response had no message id".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("+49 (170) 123-456"), "49170123456");
    }

    #[tokio::test]
    async fn unsent_mode_never_calls_out() {
        let provider = MetaCloudProvider::new(MetaCloudOptions {
            access_token: "x".to_owned(),
            graph_url: "https://graph.facebook.com".to_owned(),
            api_version: "v20.0".to_owned(),
            allow_real_send: false,
        });

        let result = provider.send("12345", "+491701234567", "hi").await;
        assert!(result.unwrap().starts_with("unsent-"));
    }
}
