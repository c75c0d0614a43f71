//! JSON-lines message source.
//!
//! One record per line:
//!
//! ```text
//! {"channel_id": "cls", "message_id": 1042, "text": "...", "channel_title": "CLS", "timestamp": "2026-03-02T01:00:00Z"}
//! ```
//!
//! `channel_title` and `timestamp` are optional. Records at or below the
//! channel's high-water mark were seen before a restart and are skipped.

use super::{IngestHandle, QueueClosed};
use crate::models::Message;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct RawRecord {
    channel_id: String,
    message_id: u64,
    text: String,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default, alias = "source_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

/// Counters for one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub forwarded: usize,
    pub behind_mark: usize,
    pub malformed: usize,
}

pub struct JsonLinesSource<R> {
    reader: R,
    marks: HashMap<String, u64>,
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    /// `marks` is the highest message id already stored per channel.
    pub fn new(reader: R, marks: HashMap<String, u64>) -> Self {
        Self { reader, marks }
    }

    /// Forward records until EOF, cancellation, or a closed queue.
    pub async fn pump(
        mut self,
        handle: IngestHandle,
        cancel: CancellationToken,
    ) -> std::io::Result<SourceStats> {
        let mut stats = SourceStats::default();
        let mut lines = (&mut self.reader).lines();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Source cancelled");
                    break;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let record: RawRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed input line: {}", e);
                    stats.malformed += 1;
                    continue;
                }
            };

            if let Some(&mark) = self.marks.get(&record.channel_id) {
                if record.message_id <= mark {
                    stats.behind_mark += 1;
                    continue;
                }
            }

            let observed_at = Utc::now();
            let message = Message {
                channel_id: record.channel_id,
                message_id: record.message_id,
                channel_title: record.channel_title,
                text: record.text,
                observed_at,
                source_timestamp: record.timestamp.unwrap_or(observed_at),
            };

            if let Err(QueueClosed) = handle.send(message).await {
                warn!("Ingest queue closed; stopping source");
                break;
            }
            stats.forwarded += 1;
        }

        info!(
            "Source finished: {} forwarded, {} behind high-water mark, {} malformed",
            stats.forwarded, stats.behind_mark, stats.malformed
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ingest_channel;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_pump_skips_marks_and_garbage() {
        let input = concat!(
            r#"{"channel_id": "a", "message_id": 5, "text": "old news here"}"#,
            "\n",
            r#"{"channel_id": "a", "message_id": 6, "text": "fresh news", "timestamp": "2026-03-02T01:00:00Z"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"channel_id": "b", "message_id": 1, "text": "other channel", "channel_title": "B"}"#,
            "\n",
        );
        let marks = HashMap::from([("a".to_string(), 5)]);
        let source = JsonLinesSource::new(BufReader::new(input.as_bytes()), marks);
        let (handle, mut queue) = ingest_channel(8);

        let stats = source.pump(handle, CancellationToken::new()).await.unwrap();

        assert_eq!(
            stats,
            SourceStats {
                forwarded: 2,
                behind_mark: 1,
                malformed: 1
            }
        );

        let first = queue.recv().await.unwrap();
        assert_eq!(first.message_id, 6);
        assert_eq!(first.source_timestamp.to_rfc3339(), "2026-03-02T01:00:00+00:00");
        let second = queue.recv().await.unwrap();
        assert_eq!(second.channel_label(), "B");
        assert_eq!(second.source_timestamp, second.observed_at);
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_stops_when_cancelled() {
        let (_writer, reader) = tokio::io::duplex(64);
        let source = JsonLinesSource::new(BufReader::new(reader), HashMap::new());
        let (handle, _queue) = ingest_channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = source.pump(handle, cancel).await.unwrap();
        assert_eq!(stats, SourceStats::default());
    }
}
