//! Channel transport boundary.
//!
//! Producers push [`Message`]s through an [`IngestHandle`]; the monitor
//! drains the matching [`IngestQueue`]. The queue is bounded, so a slow
//! consumer applies backpressure to the producer instead of growing memory.

pub mod jsonl;

pub use jsonl::JsonLinesSource;

use crate::models::Message;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("ingest queue is closed")]
pub struct QueueClosed;

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<Message>,
}

impl IngestHandle {
    /// Wait for capacity and enqueue.
    pub async fn send(&self, message: Message) -> Result<(), QueueClosed> {
        self.tx.send(message).await.map_err(|_| QueueClosed)
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct IngestQueue {
    rx: mpsc::Receiver<Message>,
}

impl IngestQueue {
    /// Next message, or `None` once every handle is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

/// Create a bounded queue.
pub fn ingest_channel(capacity: usize) -> (IngestHandle, IngestQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (IngestHandle { tx }, IngestQueue { rx })
}
