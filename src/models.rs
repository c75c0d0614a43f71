//! Data models for the impact monitor.
//!
//! This module contains the core records that flow through the pipeline:
//! observed messages, their analysis results, batches submitted for
//! inference, and notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Highest impact score the backend may assign.
pub const MAX_IMPACT_SCORE: u8 = 5;

/// Dedup key of a message: `(channel_id, message_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub channel_id: String,
    pub message_id: u64,
}

impl MessageKey {
    pub fn new(channel_id: impl Into<String>, message_id: u64) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.channel_id, self.message_id)
    }
}

/// A raw message observed from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque source identifier.
    pub channel_id: String,
    /// Unique and monotonically increasing per channel.
    pub message_id: u64,
    /// Human-readable channel name, if the transport knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    /// Raw content.
    pub text: String,
    /// When this process received the message.
    pub observed_at: DateTime<Utc>,
    /// Timestamp assigned by the origin.
    pub source_timestamp: DateTime<Utc>,
}

impl Message {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.channel_id.clone(), self.message_id)
    }

    /// Display name of the channel, falling back to its id.
    pub fn channel_label(&self) -> &str {
        self.channel_title.as_deref().unwrap_or(&self.channel_id)
    }
}

/// Direction of the expected market move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl ImpactDirection {
    /// Lenient parse of whatever the model wrote.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bullish" | "positive" | "up" | "利好" => ImpactDirection::Bullish,
            "bearish" | "negative" | "down" | "利空" => ImpactDirection::Bearish,
            _ => ImpactDirection::Neutral,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ImpactDirection::Bullish => "🔴",
            ImpactDirection::Bearish => "🟢",
            ImpactDirection::Neutral => "⚪",
        }
    }
}

impl fmt::Display for ImpactDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactDirection::Bullish => write!(f, "Bullish"),
            ImpactDirection::Bearish => write!(f, "Bearish"),
            ImpactDirection::Neutral => write!(f, "Neutral"),
        }
    }
}

/// The verdict attached to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub message_ref: MessageKey,
    /// 0..=MAX_IMPACT_SCORE
    pub impact_score: u8,
    pub rationale: String,
    /// One-line headline.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub direction: ImpactDirection,
    pub affected_sectors: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_suggestion: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub model_version: String,
}

impl AnalysisResult {
    /// Headline for rendering: the summary, or the rationale if the model gave none.
    pub fn headline(&self) -> &str {
        if self.summary.is_empty() {
            &self.rationale
        } else {
            &self.summary
        }
    }

    /// A bar like `███░░` for the score.
    pub fn score_bar(&self) -> String {
        let filled = self.impact_score.min(MAX_IMPACT_SCORE) as usize;
        format!(
            "{}{}",
            "█".repeat(filled),
            "░".repeat(MAX_IMPACT_SCORE as usize - filled)
        )
    }
}

/// Ordered group of messages submitted to the backend in one call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub messages: Vec<Message>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl Batch {
    /// Split messages into batches of at most `ceiling` items. Never yields an empty batch.
    pub fn partition(
        messages: Vec<Message>,
        ceiling: usize,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<Batch> {
        let ceiling = ceiling.max(1);
        let mut batches = Vec::new();
        let mut iter = messages.into_iter().peekable();

        while iter.peek().is_some() {
            let chunk: Vec<Message> = iter.by_ref().take(ceiling).collect();
            batches.push(Batch {
                messages: chunk,
                window_start,
                window_end,
            });
        }

        batches
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Why a message could not be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMarker {
    pub message_ref: MessageKey,
    pub reason: String,
}

/// Either a result or a failure marker.
#[derive(Debug, Clone)]
pub enum Verdict {
    Scored(AnalysisResult),
    Failed(FailureMarker),
}

/// One outcome per input message.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub message: Message,
    pub verdict: Verdict,
}

impl AnalysisOutcome {
    pub fn scored(message: Message, result: AnalysisResult) -> Self {
        Self {
            message,
            verdict: Verdict::Scored(result),
        }
    }

    pub fn failed(message: Message, reason: impl Into<String>) -> Self {
        let message_ref = message.key();
        Self {
            message,
            verdict: Verdict::Failed(FailureMarker {
                message_ref,
                reason: reason.into(),
            }),
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self.verdict, Verdict::Scored(_))
    }
}

/// Kind of notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    LiveAlert,
    DailyDigest,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::LiveAlert => write!(f, "live-alert"),
            PayloadKind::DailyDigest => write!(f, "daily-digest"),
        }
    }
}

/// A formatted payload for the notification sinks.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub kind: PayloadKind,
    pub items: Vec<(Message, AnalysisResult)>,
    pub subject: String,
    pub body: String,
}
