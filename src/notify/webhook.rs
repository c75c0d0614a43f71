//! Generic JSON webhook.

use super::NotificationSink;
use crate::error::NotificationError;
use crate::models::NotificationPayload;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Posts the whole payload, items included, as JSON.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("impact-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery {
                sink: self.name().to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "No response body".to_string());
            Err(NotificationError::Delivery {
                sink: self.name().to_string(),
                message: format!("HTTP {}: {}", status, body),
            })
        }
    }
}
