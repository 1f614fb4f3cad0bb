//! WhatsApp Cloud API HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::WhatsAppConfig;
use crate::error::DeliveryError;
use crate::sender::MessageSender;
use crate::types::{SendResponse, SendResult, TextMessageRequest};

/// Client for the WhatsApp messages endpoint.
///
/// The access token is supplied per call because each tenant owns its own.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    /// Create a client with the given configuration.
    pub fn new(config: WhatsAppConfig) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DeliveryError::Http)?;

        info!(
            "WhatsApp client ready (api: {}, version: v{})",
            config.api_url,
            config.graph_version.trim_start_matches('v')
        );

        Ok(Self { http, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, DeliveryError> {
        Self::new(WhatsAppConfig::from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    /// Send a text message from `phone_id` to `to`.
    pub async fn send_text(
        &self,
        phone_id: &str,
        access_token: &str,
        to: &str,
        body: &str,
    ) -> Result<SendResult, DeliveryError> {
        if phone_id.is_empty() || access_token.is_empty() {
            return Err(DeliveryError::Config(
                "phone_id and access token are required".to_string(),
            ));
        }

        let url = self.config.messages_url(phone_id);
        debug!("Sending WhatsApp message via {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&TextMessageRequest::new(to, body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "WhatsApp API rejected message to {}", to);
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // A 2xx with an unexpected body still counts as delivered.
        let parsed: SendResponse = response.json().await.unwrap_or_default();
        let message_id = parsed.messages.into_iter().next().map(|m| m.id);

        info!(to = %to, message_id = ?message_id, "WhatsApp message sent");
        Ok(SendResult { message_id })
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send_text(
        &self,
        phone_id: &str,
        access_token: &str,
        to: &str,
        body: &str,
    ) -> Result<SendResult, DeliveryError> {
        WhatsAppClient::send_text(self, phone_id, access_token, to, body).await
    }
}
