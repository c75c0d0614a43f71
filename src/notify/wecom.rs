//! WeCom group-robot webhook.

use super::NotificationSink;
use crate::error::NotificationError;
use crate::models::NotificationPayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct MarkdownMessage<'a> {
    msgtype: &'static str,
    markdown: MarkdownContent<'a>,
}

#[derive(Debug, Serialize)]
struct MarkdownContent<'a> {
    content: &'a str,
}

/// The robot answers 200 with a non-zero `errcode` on rejection.
#[derive(Debug, Deserialize)]
struct RobotResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

pub struct WeComSink {
    client: Client,
    url: String,
}

impl WeComSink {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    fn error(&self, message: impl Into<String>) -> NotificationError {
        NotificationError::Delivery {
            sink: self.name().to_string(),
            message: message.into(),
        }
    }
}

fn render(payload: &NotificationPayload) -> String {
    format!("## {}\n\n{}", payload.subject, payload.body)
}

#[async_trait]
impl NotificationSink for WeComSink {
    fn name(&self) -> &str {
        "wecom"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let content = render(payload);
        let message = MarkdownMessage {
            msgtype: "markdown",
            markdown: MarkdownContent { content: &content },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| self.error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.error(format!("HTTP {}: {}", status, body)));
        }

        let reply: RobotResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("unreadable response: {}", e)))?;

        if reply.errcode != 0 {
            return Err(self.error(format!("errcode {}: {}", reply.errcode, reply.errmsg)));
        }

        debug!("WeCom accepted {}", payload.kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadKind;

    #[test]
    fn test_markdown_shape() {
        let payload = NotificationPayload {
            kind: PayloadKind::DailyDigest,
            items: Vec::new(),
            subject: "Daily".to_string(),
            body: "body".to_string(),
        };
        let content = render(&payload);
        let json = serde_json::to_value(MarkdownMessage {
            msgtype: "markdown",
            markdown: MarkdownContent { content: &content },
        })
        .unwrap();

        assert_eq!(json["msgtype"], "markdown");
        assert_eq!(json["markdown"]["content"], "## Daily\n\nbody");
    }

    #[test]
    fn test_robot_response_parsing() {
        let ok: RobotResponse = serde_json::from_str(r#"{"errcode":0,"errmsg":"ok"}"#).unwrap();
        assert_eq!(ok.errcode, 0);
        let bad: RobotResponse =
            serde_json::from_str(r#"{"errcode":93000,"errmsg":"invalid webhook url"}"#).unwrap();
        assert_eq!(bad.errcode, 93000);
    }
}
