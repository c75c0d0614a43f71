//! Append-only result store.
//!
//! Every record is one JSON line holding a message and its analysis result.
//! Writes are appended and `fsync`ed before returning. On open the log is
//! replayed into an in-memory index; a later line for the same key
//! supersedes an earlier one, which is how overwrites stay append-only.

use crate::error::StorageError;
use crate::models::{AnalysisResult, ImpactDirection, Message, MessageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Whether a write may replace an existing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    InsertOnly,
    Overwrite,
}

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Overwritten,
    /// A result already existed and the write was a no-op.
    DuplicateSuppressed,
}

impl WriteStatus {
    pub fn is_written(&self) -> bool {
        !matches!(self, WriteStatus::DuplicateSuppressed)
    }
}

/// One line of the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    message: Message,
    result: AnalysisResult,
}

/// Aggregate numbers for one reporting window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyStats {
    pub total: usize,
    pub valuable: usize,
    pub bullish: usize,
    pub bearish: usize,
    /// Sector -> valuable item count, most frequent first, at most ten.
    pub top_sectors: Vec<(String, usize)>,
}

/// The open log file.
struct LogFile {
    file: File,
    /// The file may end in a partial line that could not be cut off.
    torn: bool,
}

impl LogFile {
    /// Append one newline-terminated record and sync it. On failure the
    /// file is cut back to its previous length so a partial line never
    /// merges with the next record.
    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        let start = self.file.metadata().await?.len();

        match self.write_line(line).await {
            Ok(()) => {
                self.torn = false;
                Ok(())
            }
            Err(e) => {
                self.rollback(start).await;
                Err(e)
            }
        }
    }

    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.torn {
            self.file.write_all(b"\n").await?;
        }
        self.file.write_all(line).await?;
        self.file.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len).await?;
        self.file.sync_data().await
    }

    async fn rollback(&mut self, len: u64) {
        if let Err(e) = self.truncate(len).await {
            error!("Could not cut back a failed append: {}", e);
            self.torn = true;
        }
    }
}

/// The durable record store.
pub struct Storage {
    path: PathBuf,
    /// Single writer: serializes every append, which also serializes per key.
    writer: Mutex<LogFile>,
    index: RwLock<BTreeMap<MessageKey, StoredRecord>>,
}

impl Storage {
    /// Open (or create) the log at `path` and replay it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut index = BTreeMap::new();
        let mut needs_terminator = false;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                needs_terminator = !content.is_empty() && !content.ends_with('\n');
                let mut skipped = 0usize;

                for (line_no, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StoredRecord>(line) {
                        Ok(record) => {
                            index.insert(record.message.key(), record);
                        }
                        Err(e) => {
                            skipped += 1;
                            warn!("Skipping unreadable record at line {}: {}", line_no + 1, e);
                        }
                    }
                }

                if skipped > 0 {
                    warn!("{} unreadable records skipped in {}", skipped, path.display());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // A torn final line would otherwise swallow the next append.
        if needs_terminator {
            file.write_all(b"\n").await?;
            file.sync_data().await?;
        }

        info!("Storage opened: {} ({} records)", path.display(), index.len());

        Ok(Self {
            path,
            writer: Mutex::new(LogFile { file, torn: false }),
            index: RwLock::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a message and its result, enforcing at most one result per key.
    pub async fn write(
        &self,
        message: &Message,
        result: &AnalysisResult,
        mode: WriteMode,
    ) -> Result<WriteStatus, StorageError> {
        let key = message.key();
        if result.message_ref != key {
            return Err(StorageError::KeyMismatch {
                message: key.to_string(),
                result: result.message_ref.to_string(),
            });
        }

        let mut writer = self.writer.lock().await;

        let existed = self.exists(&key);
        if existed && mode == WriteMode::InsertOnly {
            debug!("Duplicate suppressed for {}", key);
            return Ok(WriteStatus::DuplicateSuppressed);
        }

        let record = StoredRecord {
            message: message.clone(),
            result: result.clone(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        writer.append(&line).await?;

        self.index_mut().insert(key, record);

        Ok(if existed {
            WriteStatus::Overwritten
        } else {
            WriteStatus::Written
        })
    }

    /// Cheap existence check against the index.
    pub fn exists(&self, key: &MessageKey) -> bool {
        self.index_ref().contains_key(key)
    }

    /// Records whose `source_timestamp` lies in `range` with score at least
    /// `min_score`, ordered by source time then key.
    pub fn query(
        &self,
        range: Range<DateTime<Utc>>,
        min_score: u8,
    ) -> Vec<(Message, AnalysisResult)> {
        let index = self.index_ref();
        let mut rows: Vec<(Message, AnalysisResult)> = index
            .values()
            .filter(|r| range.contains(&r.message.source_timestamp))
            .filter(|r| r.result.impact_score >= min_score)
            .map(|r| (r.message.clone(), r.result.clone()))
            .collect();

        rows.sort_by(|a, b| {
            a.0.source_timestamp
                .cmp(&b.0.source_timestamp)
                .then_with(|| a.0.key().cmp(&b.0.key()))
        });
        rows
    }

    /// Highest stored message id per channel.
    pub fn high_water_marks(&self) -> HashMap<String, u64> {
        let mut marks: HashMap<String, u64> = HashMap::new();
        for key in self.index_ref().keys() {
            let mark = marks.entry(key.channel_id.clone()).or_insert(key.message_id);
            *mark = (*mark).max(key.message_id);
        }
        marks
    }

    /// Summary numbers for records in `range`.
    pub fn daily_stats(&self, range: Range<DateTime<Utc>>, valuable_threshold: u8) -> DailyStats {
        let rows = self.query(range, 0);
        let mut stats = DailyStats {
            total: rows.len(),
            ..DailyStats::default()
        };

        let mut sectors: HashMap<String, usize> = HashMap::new();
        for (_, result) in rows.iter().filter(|(_, r)| r.impact_score >= valuable_threshold) {
            stats.valuable += 1;
            match result.direction {
                ImpactDirection::Bullish => stats.bullish += 1,
                ImpactDirection::Bearish => stats.bearish += 1,
                ImpactDirection::Neutral => {}
            }
            for sector in &result.affected_sectors {
                *sectors.entry(sector.clone()).or_default() += 1;
            }
        }

        let mut top: Vec<(String, usize)> = sectors.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(10);
        stats.top_sectors = top;

        stats
    }

    pub fn len(&self) -> usize {
        self.index_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_ref(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<MessageKey, StoredRecord>> {
        match self.index.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn index_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<MessageKey, StoredRecord>> {
        match self.index.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
