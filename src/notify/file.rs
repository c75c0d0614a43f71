//! Markdown drop directory.

use super::NotificationSink;
use crate::error::NotificationError;
use crate::models::NotificationPayload;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Writes each payload to `<dir>/<kind>-<timestamp>-<seq>.md`.
pub struct FileSink {
    dir: PathBuf,
    seq: AtomicU64,
}

impl FileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            seq: AtomicU64::new(0),
        }
    }

    fn error(&self, e: std::io::Error) -> NotificationError {
        NotificationError::Delivery {
            sink: self.name().to_string(),
            message: format!("{}: {}", self.dir.display(), e),
        }
    }
}

#[async_trait]
impl NotificationSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.error(e))?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!(
            "{}-{}-{}.md",
            payload.kind,
            Utc::now().format("%Y%m%dT%H%M%S"),
            seq
        ));

        let content = format!("# {}\n\n{}\n", payload.subject, payload.body);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| self.error(e))?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}
