//! SMTP delivery over implicit TLS.
//!
//! The markdown body is rendered to HTML, with the direction markers
//! turned into colored labels.

use super::NotificationSink;
use crate::error::NotificationError;
use crate::models::NotificationPayload;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pulldown_cmark::{html, Options, Parser};
use std::time::Duration;
use tracing::debug;

const STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; padding: 20px; max-width: 800px; margin: 0 auto; }
h2, h3 { color: #333; }
table { border-collapse: collapse; width: 100%; margin: 10px 0; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f5f5f5; }
code { background: #f5f5f5; padding: 2px 5px; border-radius: 3px; }
.bullish { color: #e53935; font-weight: bold; }
.bearish { color: #43a047; font-weight: bold; }
.neutral { color: #757575; }";

/// SMTP account and recipient.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub receiver: String,
}

pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSink {
    /// Addresses are parsed here so a bad config fails at startup.
    pub fn new(settings: EmailSettings, timeout: Duration) -> anyhow::Result<Self> {
        let from = Mailbox::new(Some("Impact Monitor".to_string()), settings.sender.parse()?);
        let to = Mailbox::new(None, settings.receiver.parse()?);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(settings.sender, settings.password))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }

    fn message(&self, payload: &NotificationPayload) -> Result<Message, NotificationError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(payload.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(render_html(&payload.body))
            .map_err(|e| self.error(e.to_string()))
    }

    fn error(&self, message: impl Into<String>) -> NotificationError {
        NotificationError::Delivery {
            sink: self.name().to_string(),
            message: message.into(),
        }
    }
}

/// Markdown to a standalone HTML document.
pub fn render_html(markdown: &str) -> String {
    let mut content = String::new();
    html::push_html(&mut content, Parser::new_ext(markdown, Options::ENABLE_TABLES));

    let content = content
        .replace("🔴", "<span class=\"bullish\">🔴 Bullish</span>")
        .replace("🟢", "<span class=\"bearish\">🟢 Bearish</span>")
        .replace("⚪", "<span class=\"neutral\">⚪ Neutral</span>");

    format!(
        "<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}\n</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        STYLE, content
    )
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let message = self.message(payload)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| self.error(e.to_string()))?;
        debug!("SMTP accepted: {:?}", response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadKind;

    fn settings() -> EmailSettings {
        EmailSettings {
            server: "smtp.example.com".to_string(),
            port: 465,
            sender: "monitor@example.com".to_string(),
            password: "secret".to_string(),
            receiver: "desk@example.com".to_string(),
        }
    }

    #[test]
    fn test_render_html_tables_and_direction_labels() {
        let html = render_html("## Overview\n\n| a | b |\n|---|---|\n| 🔴 | 3 |\n");
        assert!(html.starts_with("<html>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<h2>Overview</h2>"));
        assert!(html.contains("<span class=\"bullish\">🔴 Bullish</span>"));
        assert!(html.contains(".bearish"));
    }

    #[tokio::test]
    async fn test_message_shape() {
        let sink = EmailSink::new(settings(), Duration::from_secs(5)).unwrap();
        let payload = NotificationPayload {
            kind: PayloadKind::DailyDigest,
            items: Vec::new(),
            subject: "Daily digest 2026-03-01".to_string(),
            body: "**No significant events**".to_string(),
        };

        let formatted = String::from_utf8(sink.message(&payload).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Subject: Daily digest 2026-03-01"));
        assert!(formatted.contains("To: desk@example.com"));
        assert!(formatted.contains("monitor@example.com"));
        assert!(formatted.contains("Content-Type: text/html"));
        assert_eq!(sink.name(), "email");
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_at_construction() {
        let mut bad = settings();
        bad.receiver = "not an address".to_string();
        assert!(EmailSink::new(bad, Duration::from_secs(5)).is_err());
    }
}
