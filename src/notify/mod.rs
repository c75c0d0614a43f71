//! Notification fan-out.
//!
//! Every configured sink gets every payload. Sinks are attempted
//! concurrently, each under its own timeout, and one sink failing never
//! affects another.

pub mod email;
pub mod file;
pub mod webhook;
pub mod wecom;

pub use email::{EmailSettings, EmailSink};
pub use file::FileSink;
pub use webhook::WebhookSink;
pub use wecom::WeComSink;

use crate::config::NotificationConfig;
use crate::error::NotificationError;
use crate::models::NotificationPayload;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Marker appended to truncated bodies.
pub const TRUNCATION_MARKER: &str = "\n\n...(truncated)";

/// A delivery target.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Attempt delivery once.
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;
}

/// Per-sink result of one dispatch.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub sink: String,
    pub result: Result<(), NotificationError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    timeout: Duration,
    max_body_chars: usize,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>, timeout: Duration, max_body_chars: usize) -> Self {
        Self {
            sinks,
            timeout,
            max_body_chars,
        }
    }

    /// Build the sinks named in the configuration.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();

        if let Some(url) = &config.wecom_webhook_url {
            sinks.push(Arc::new(WeComSink::new(url.clone(), timeout)?));
        }
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookSink::new(url.clone(), timeout)?));
        }
        if let Some(settings) = config.email_settings() {
            sinks.push(Arc::new(EmailSink::new(settings, timeout)?));
        }
        if let Some(dir) = &config.output_dir {
            sinks.push(Arc::new(FileSink::new(dir.clone())));
        }

        info!(
            "Notification sinks: {}",
            if sinks.is_empty() {
                "none".to_string()
            } else {
                sinks.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
            }
        );

        Ok(Self::new(sinks, timeout, config.max_body_chars))
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver to every sink. Never fails; outcomes are returned and logged.
    pub async fn dispatch(&self, payload: &NotificationPayload) -> Vec<DeliveryOutcome> {
        if self.sinks.is_empty() {
            warn!("No notification sinks configured; {} dropped", payload.kind);
            return Vec::new();
        }

        let payload = self.truncated(payload);
        let payload = &payload;

        let sends = self.sinks.iter().map(|sink| async move {
            let name = sink.name().to_string();
            let result = match tokio::time::timeout(self.timeout, sink.send(payload)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout {
                    sink: name.clone(),
                    seconds: self.timeout.as_secs(),
                }),
            };
            DeliveryOutcome { sink: name, result }
        });

        let outcomes = futures::future::join_all(sends).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => info!(
                    "Delivered {} ({} items) via {}",
                    payload.kind,
                    payload.items.len(),
                    outcome.sink
                ),
                Err(e) => warn!("Failed to deliver {}: {}", payload.kind, e),
            }
        }

        outcomes
    }

    fn truncated(&self, payload: &NotificationPayload) -> NotificationPayload {
        let mut payload = payload.clone();
        payload.body = truncate_body(&payload.body, self.max_body_chars);
        payload
    }
}

/// Cut a body to `max` characters including the marker.
pub fn truncate_body(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        return body.to_string();
    }
    let keep = max.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut cut: String = body.chars().take(keep).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording sinks for tests.

    use super::*;
    use std::sync::Mutex;

    pub struct RecordingSink {
        pub name: String,
        pub sent: Mutex<Vec<NotificationPayload>>,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl RecordingSink {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                sent: Mutex::new(Vec::new()),
                fail: false,
                delay: None,
            }
        }

        pub fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }

        pub fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(name)
            }
        }

        pub fn payloads(&self) -> Vec<NotificationPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(NotificationError::Delivery {
                    sink: self.name.clone(),
                    message: "refused".to_string(),
                });
            }
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::models::PayloadKind;

    fn payload(body: &str) -> NotificationPayload {
        NotificationPayload {
            kind: PayloadKind::LiveAlert,
            items: Vec::new(),
            subject: "subject".to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let good = Arc::new(RecordingSink::new("good"));
        let bad = Arc::new(RecordingSink::failing("bad"));
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![bad.clone(), good.clone()];
        let dispatcher = Dispatcher::new(sinks, Duration::from_secs(1), 100);

        let outcomes = dispatcher.dispatch(&payload("hello")).await;

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_delivered());
        assert!(outcomes[1].is_delivered());
        assert_eq!(good.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let slow: Arc<dyn NotificationSink> =
            Arc::new(RecordingSink::slow("slow", Duration::from_secs(5)));
        let dispatcher = Dispatcher::new(vec![slow], Duration::from_millis(20), 100);

        let outcomes = dispatcher.dispatch(&payload("hello")).await;
        assert!(matches!(
            outcomes[0].result,
            Err(NotificationError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_body_truncated_before_send() {
        let sink = Arc::new(RecordingSink::new("s"));
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![sink.clone()];
        let dispatcher = Dispatcher::new(sinks, Duration::from_secs(1), 30);

        dispatcher.dispatch(&payload(&"x".repeat(100))).await;

        let body = &sink.payloads()[0].body;
        assert_eq!(body.chars().count(), 30);
        assert!(body.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn test_no_sinks_is_not_an_error() {
        let dispatcher = Dispatcher::new(Vec::new(), Duration::from_secs(1), 30);
        assert!(dispatcher.dispatch(&payload("x")).await.is_empty());
    }

    #[test]
    fn test_truncate_body_short_untouched() {
        assert_eq!(truncate_body("短消息", 10), "短消息");
    }

    #[test]
    fn test_from_config_builds_configured_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotificationConfig {
            webhook_url: Some("http://localhost:9/hook".to_string()),
            output_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
    }

    #[tokio::test]
    async fn test_from_config_adds_email_only_when_complete() {
        let partial = NotificationConfig {
            email_sender: Some("monitor@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(Dispatcher::from_config(&partial).unwrap().sink_count(), 0);

        let complete = NotificationConfig {
            email_receiver: Some("desk@example.com".to_string()),
            email_password: Some("secret".to_string()),
            ..partial
        };
        let dispatcher = Dispatcher::from_config(&complete).unwrap();
        assert_eq!(dispatcher.sink_count(), 1);
        assert_eq!(dispatcher.sinks[0].name(), "email");
    }
}
