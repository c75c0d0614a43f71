//! Long-running scheduler: ingestion task, tick interval, daily jobs and
//! manual triggers, all stopped by one cancellation token.

use super::schedule::{delay_until, next_run_after};
use super::{Monitor, MonitorState};
use crate::transport::IngestQueue;
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("monitor is not running")]
pub struct MonitorStopped;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Tick,
    Report(Option<NaiveDate>),
}

/// Manual triggers for a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<Command>,
}

impl MonitorHandle {
    /// Run a tick now instead of waiting for the interval.
    pub async fn force_tick(&self) -> Result<(), MonitorStopped> {
        self.tx.send(Command::Tick).await.map_err(|_| MonitorStopped)
    }

    /// Send the digest for `date` (default: yesterday) now.
    pub async fn force_report(&self, date: Option<NaiveDate>) -> Result<(), MonitorStopped> {
        self.tx
            .send(Command::Report(date))
            .await
            .map_err(|_| MonitorStopped)
    }
}

/// Receiving side of [`MonitorHandle`].
#[derive(Debug)]
pub struct ControlQueue {
    rx: mpsc::Receiver<Command>,
}

pub fn control_channel() -> (MonitorHandle, ControlQueue) {
    let (tx, rx) = mpsc::channel(8);
    (MonitorHandle { tx }, ControlQueue { rx })
}

/// Deadline for a daily `(hour, minute)` job, if scheduled.
fn next_deadline(monitor: &Monitor, at: Option<(u32, u32)>) -> Option<Instant> {
    let (hour, minute) = at?;
    let now = Utc::now();
    let when = next_run_after(now, hour, minute, monitor.settings.offset);
    debug!("Next run at {} local {:02}:{:02}", when, hour, minute);
    Some(Instant::now() + delay_until(now, when))
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Monitor {
    /// Run until `cancel` fires. Ingestion runs on its own task so it never
    /// waits on a tick.
    pub async fn run(self: Arc<Self>, mut queue: IngestQueue, mut control: ControlQueue, cancel: CancellationToken) {
        info!(
            "Monitoring started: tick every {}s, push threshold {}",
            self.settings.tick_interval.as_secs(),
            self.settings.push_threshold
        );

        let ingest_monitor = self.clone();
        let ingest_cancel = cancel.clone();
        let ingestion = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ingest_cancel.cancelled() => break,
                    message = queue.recv() => match message {
                        Some(message) => {
                            ingest_monitor.ingest(message);
                        }
                        None => {
                            info!("Ingest queue closed; no more input");
                            break;
                        }
                    },
                }
            }
        });

        let interval = self.settings.tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report_at = next_deadline(&self, self.settings.report_at);
        let mut trends_at = if self.has_refresher() {
            next_deadline(&self, self.settings.trends_at)
        } else {
            None
        };
        let mut control_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    self.with_grace("tick", self.tick(), &cancel).await;
                }

                command = control.rx.recv(), if control_open => match command {
                    Some(Command::Tick) => {
                        info!("Manual tick requested");
                        self.with_grace("tick", self.tick(), &cancel).await;
                    }
                    Some(Command::Report(date)) => {
                        info!("Manual report requested");
                        self.with_grace("report", self.send_report(date), &cancel).await;
                    }
                    None => control_open = false,
                },

                _ = sleep_until_opt(report_at) => {
                    self.with_grace("report", self.send_report(None), &cancel).await;
                    report_at = next_deadline(&self, self.settings.report_at);
                }

                _ = sleep_until_opt(trends_at) => {
                    self.with_grace("keyword refresh", self.refresh_keywords(), &cancel).await;
                    trends_at = next_deadline(&self, self.settings.trends_at);
                }
            }
        }

        self.transition(MonitorState::ShuttingDown);
        let dropped = self.buffered_len();
        if dropped > 0 {
            warn!("Shutting down with {} unanalyzed buffered message(s)", dropped);
        }
        if let Err(e) = ingestion.await {
            warn!("Ingestion task ended abnormally: {}", e);
        }

        let totals = self.totals();
        info!(
            "Monitor stopped: analyzed {}, stored {}, failed {}, notified {}",
            totals.analyzed, totals.stored, totals.failed, totals.notified
        );
    }

    /// Drive `job` to completion, but once shutdown is requested give it
    /// only the grace period.
    async fn with_grace<F: Future>(&self, what: &str, job: F, cancel: &CancellationToken) -> Option<F::Output> {
        tokio::pin!(job);

        tokio::select! {
            output = &mut job => Some(output),
            _ = cancel.cancelled() => {
                warn!(
                    "Shutdown requested during {}; waiting up to {}s",
                    what,
                    self.settings.shutdown_grace.as_secs()
                );
                match tokio::time::timeout(self.settings.shutdown_grace, &mut job).await {
                    Ok(output) => Some(output),
                    Err(_) => {
                        warn!("Abandoning in-flight {}", what);
                        None
                    }
                }
            }
        }
    }
}
