//! The monitoring control loop.
//!
//! Messages are filtered and buffered as they arrive. Each tick swaps the
//! buffer out, scores it, persists the results and pushes the high-impact
//! ones. Ticks never overlap and a failing tick never stops the next one.

pub mod runner;
pub mod schedule;
pub mod state;

pub use runner::{control_channel, ControlQueue, MonitorHandle};
pub use state::MonitorState;

use crate::analyzer::Analyzer;
use crate::config::Config;
use crate::filter::MessageFilter;
use crate::models::{AnalysisResult, Batch, Message, MessageKey, Verdict};
use crate::notify::{DeliveryOutcome, Dispatcher};
use crate::report::{self, DailyReportBuilder};
use crate::storage::{Storage, WriteMode, WriteStatus};
use crate::transport::IngestQueue;
use crate::trends::KeywordRefresher;
use chrono::{FixedOffset, NaiveDate, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub tick_interval: Duration,
    pub push_threshold: u8,
    pub max_buffered: usize,
    pub shutdown_grace: Duration,
    pub offset: FixedOffset,
    /// Local `(hour, minute)` of the scheduled digest.
    pub report_at: Option<(u32, u32)>,
    /// Local `(hour, minute)` of the keyword refresh.
    pub trends_at: Option<(u32, u32)>,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.monitor.tick_interval_minutes.max(1) * 60),
            push_threshold: config.monitor.push_threshold,
            max_buffered: config.monitor.max_buffered_messages.max(1),
            shutdown_grace: Duration::from_secs(config.monitor.shutdown_grace_seconds),
            offset: config.report.offset(),
            report_at: config
                .report
                .enabled
                .then_some((config.report.hour, config.report.minute)),
            trends_at: config
                .trends
                .enabled
                .then_some((config.trends.hour, config.trends.minute)),
        }
    }
}

/// What happened to one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Buffered,
    /// Buffered, pushing out the oldest buffered message.
    BufferedWithEviction(MessageKey),
    Filtered,
    /// Already stored, already buffered, or in the running tick.
    Known,
}

/// Counts for one tick, or accumulated over the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub admitted: usize,
    pub filtered: usize,
    pub skipped: usize,
    pub evicted: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub write_failed: usize,
    pub notified: usize,
    pub delivered: usize,
}

impl TickReport {
    fn absorb(&mut self, other: &TickReport) {
        self.admitted += other.admitted;
        self.filtered += other.filtered;
        self.skipped += other.skipped;
        self.evicted += other.evicted;
        self.analyzed += other.analyzed;
        self.failed += other.failed;
        self.stored += other.stored;
        self.duplicates += other.duplicates;
        self.write_failed += other.write_failed;
        self.notified += other.notified;
        self.delivered += other.delivered;
    }
}

#[derive(Debug, Default)]
struct IngestCounters {
    admitted: AtomicUsize,
    filtered: AtomicUsize,
    skipped: AtomicUsize,
    evicted: AtomicUsize,
}

impl IngestCounters {
    fn take(&self, report: &mut TickReport) {
        report.admitted = self.admitted.swap(0, Ordering::Relaxed);
        report.filtered = self.filtered.swap(0, Ordering::Relaxed);
        report.skipped = self.skipped.swap(0, Ordering::Relaxed);
        report.evicted = self.evicted.swap(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Buffer {
    queue: VecDeque<Message>,
    keys: HashSet<MessageKey>,
    /// Keys handed to the running tick.
    in_flight: HashSet<MessageKey>,
}

pub struct Monitor {
    settings: MonitorSettings,
    filter: Arc<MessageFilter>,
    analyzer: Arc<Analyzer>,
    storage: Arc<Storage>,
    dispatcher: Arc<Dispatcher>,
    reporter: DailyReportBuilder,
    refresher: Option<KeywordRefresher>,
    buffer: Mutex<Buffer>,
    state: Mutex<MonitorState>,
    counters: IngestCounters,
    totals: Mutex<TickReport>,
    tick_lock: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        filter: Arc<MessageFilter>,
        analyzer: Arc<Analyzer>,
        storage: Arc<Storage>,
        dispatcher: Arc<Dispatcher>,
        reporter: DailyReportBuilder,
        refresher: Option<KeywordRefresher>,
    ) -> Self {
        Self {
            settings,
            filter,
            analyzer,
            storage,
            dispatcher,
            reporter,
            refresher,
            buffer: Mutex::new(Buffer::default()),
            state: Mutex::new(MonitorState::Idle),
            counters: IngestCounters::default(),
            totals: Mutex::new(TickReport::default()),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> MonitorState {
        *lock(&self.state)
    }

    pub fn buffered_len(&self) -> usize {
        lock(&self.buffer).queue.len()
    }

    /// Counts accumulated over every completed tick.
    pub fn totals(&self) -> TickReport {
        *lock(&self.totals)
    }

    fn transition(&self, next: MonitorState) {
        let mut state = lock(&self.state);
        if *state == next {
            return;
        }
        if state.can_transition_to(next) {
            debug!("Monitor {} -> {}", *state, next);
            *state = next;
        } else {
            debug!("Ignoring transition {} -> {}", *state, next);
        }
    }

    /// Filter and buffer one message. Never blocks on a tick.
    pub fn ingest(&self, message: Message) -> Admission {
        if !self.filter.admit(&message) {
            self.counters.filtered.fetch_add(1, Ordering::Relaxed);
            return Admission::Filtered;
        }

        let key = message.key();
        let admission = {
            // Checked under the buffer lock: a tick stores its results
            // before it releases the in-flight keys.
            let mut buffer = lock(&self.buffer);
            if buffer.keys.contains(&key) || buffer.in_flight.contains(&key) || self.storage.exists(&key) {
                debug!("Skipping {}: already buffered or analyzed", key);
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return Admission::Known;
            }

            let mut admission = Admission::Buffered;
            if buffer.queue.len() >= self.settings.max_buffered {
                if let Some(oldest) = buffer.queue.pop_front() {
                    let oldest = oldest.key();
                    buffer.keys.remove(&oldest);
                    warn!(
                        "Buffer full ({} messages); evicting oldest {}",
                        self.settings.max_buffered, oldest
                    );
                    self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                    admission = Admission::BufferedWithEviction(oldest);
                }
            }

            buffer.keys.insert(key);
            buffer.queue.push_back(message);
            admission
        };

        if let Admission::BufferedWithEviction(ref evicted) = admission {
            self.filter.forget(evicted);
        }
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        // A running tick owns the state; this message waits for the next one.
        let mut state = lock(&self.state);
        if *state == MonitorState::Idle {
            *state = MonitorState::Accumulating;
        }
        admission
    }

    /// Ingest until every transport handle is dropped.
    pub async fn drain_queue(&self, queue: &mut IngestQueue) -> usize {
        let mut received = 0;
        while let Some(message) = queue.recv().await {
            self.ingest(message);
            received += 1;
        }
        received
    }

    /// Run one filter→analyze→store→notify cycle over the current buffer.
    pub async fn tick(&self) -> TickReport {
        let _tick = self.tick_lock.lock().await;

        let drained = {
            let mut buffer = lock(&self.buffer);
            let drained = std::mem::take(&mut buffer.queue);
            buffer.in_flight = std::mem::take(&mut buffer.keys);
            drained
        };

        let mut report = TickReport::default();
        self.counters.take(&mut report);

        if drained.is_empty() {
            debug!("Tick: nothing buffered");
            self.finish_tick(&report);
            return report;
        }

        self.transition(MonitorState::Analyzing);

        let mut messages: Vec<Message> = drained.into();
        // Stable: equal timestamps keep arrival order.
        messages.sort_by_key(|m| m.source_timestamp);

        let window_start = messages
            .iter()
            .map(|m| m.observed_at)
            .min()
            .unwrap_or_else(Utc::now);
        let batches = Batch::partition(
            messages,
            self.analyzer.settings().max_batch_size,
            window_start,
            Utc::now(),
        );

        let outcomes = self.analyzer.analyze_batches(batches).await;
        report.analyzed = outcomes.len();

        let mut alerts: Vec<(Message, AnalysisResult)> = Vec::new();
        for outcome in outcomes {
            match outcome.verdict {
                Verdict::Scored(result) => {
                    let push = result.impact_score >= self.settings.push_threshold;
                    match self
                        .storage
                        .write(&outcome.message, &result, WriteMode::InsertOnly)
                        .await
                    {
                        Ok(WriteStatus::DuplicateSuppressed) => {
                            report.duplicates += 1;
                            continue;
                        }
                        Ok(_) => report.stored += 1,
                        Err(e) => {
                            error!("Failed to store result for {}: {}", outcome.message.key(), e);
                            report.write_failed += 1;
                        }
                    }
                    if push {
                        alerts.push((outcome.message, result));
                    }
                }
                Verdict::Failed(marker) => {
                    warn!("No result for {}: {}", marker.message_ref, marker.reason);
                    self.filter.forget(&marker.message_ref);
                    report.failed += 1;
                }
            }
        }

        if !alerts.is_empty() {
            self.transition(MonitorState::Dispatching);
            report.notified = alerts.len();
            let payload = report::render_live_alert(alerts, self.settings.offset);
            let outcomes = self.dispatcher.dispatch(&payload).await;
            report.delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        }

        self.finish_tick(&report);
        report
    }

    fn finish_tick(&self, report: &TickReport) {
        lock(&self.buffer).in_flight.clear();
        lock(&self.totals).absorb(report);
        if self.state() != MonitorState::Idle {
            self.transition(MonitorState::Accumulating);
        }

        if report.analyzed > 0 || report.filtered > 0 || report.skipped > 0 {
            info!(
                "Tick: admitted {}, filtered {}, skipped {}, evicted {}, analyzed {}, failed {}, stored {}, duplicates {}, write errors {}, notified {}",
                report.admitted,
                report.filtered,
                report.skipped,
                report.evicted,
                report.analyzed,
                report.failed,
                report.stored,
                report.duplicates,
                report.write_failed,
                report.notified
            );
        }
    }

    /// Build and dispatch the digest for `date` (default: yesterday, local).
    pub async fn send_report(&self, date: Option<NaiveDate>) -> Vec<DeliveryOutcome> {
        let date = date.unwrap_or_else(|| self.reporter.previous_day(Utc::now()));
        let payload = self.reporter.build(date).await;
        self.dispatcher.dispatch(&payload).await
    }

    /// Refresh dynamic keywords if a refresher is configured.
    pub async fn refresh_keywords(&self) {
        let Some(refresher) = &self.refresher else {
            return;
        };
        let today = Utc::now().with_timezone(&self.settings.offset).date_naive();
        if let Err(e) = refresher.refresh(today).await {
            error!("Keyword refresh failed: {:#}", e);
        }
    }

    pub fn has_refresher(&self) -> bool {
        self.refresher.is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::analyzer::testing::{respond_all, ScriptedBackend};
    use crate::backend::{InferenceBackend, InferenceRequest};
    use crate::error::BackendError;
    use crate::notify::testing::RecordingSink;
    use crate::models::fixtures::message;
    use crate::models::PayloadKind;
    use std::sync::atomic::AtomicBool;

    fn scored_ids(payload: &crate::models::NotificationPayload) -> Vec<u64> {
        payload.items.iter().map(|(m, _)| m.message_id).collect()
    }

    #[tokio::test]
    async fn test_below_threshold_stored_not_pushed() {
        let h = harness().await;
        h.monitor.ingest(message("c", 1, "sector rotation note score:3", 0));

        let report = h.monitor.tick().await;

        assert_eq!(report.stored, 1);
        assert_eq!(report.notified, 0);
        assert!(h.storage.exists(&MessageKey::new("c", 1)));
        assert!(h.sink.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_above_threshold_stored_and_pushed() {
        let h = harness().await;
        h.monitor.ingest(message("c", 1, "central bank cuts rates score:5", 0));

        let report = h.monitor.tick().await;

        assert_eq!(report.stored, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.delivered, 1);
        let payloads = h.sink.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind, PayloadKind::LiveAlert);
        assert_eq!(scored_ids(&payloads[0]), vec![1]);
    }

    #[tokio::test]
    async fn test_alert_order_follows_source_timestamp() {
        let h = harness().await;
        // Arrival order differs from source order; 3 and 4 share a timestamp.
        h.monitor.ingest(message("c", 1, "late breaking item score:5", 30));
        h.monitor.ingest(message("c", 2, "early breaking item score:4", 10));
        h.monitor.ingest(message("d", 3, "tied item number one score:5", 20));
        h.monitor.ingest(message("d", 4, "tied item number two score:5", 20));

        h.monitor.tick().await;

        let payloads = h.sink.payloads();
        assert_eq!(scored_ids(&payloads[0]), vec![2, 3, 4, 1]);
    }

    #[tokio::test]
    async fn test_filtered_and_known_messages_skipped() {
        let h = harness().await;
        assert_eq!(h.monitor.ingest(message("c", 1, "short", 0)), Admission::Filtered);
        assert_eq!(
            h.monitor.ingest(message("c", 2, "a perfectly normal message", 0)),
            Admission::Buffered
        );
        assert_eq!(
            h.monitor.ingest(message("c", 2, "a perfectly normal message", 0)),
            Admission::Known
        );

        let report = h.monitor.tick().await;
        assert_eq!(report.admitted, 1);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.analyzed, 1);

        // Stored now, so a re-delivery is known.
        assert_eq!(
            h.monitor.ingest(message("c", 2, "a perfectly normal message", 0)),
            Admission::Known
        );
    }

    #[tokio::test]
    async fn test_restart_restores_and_skips_known_keys() {
        let h = harness().await;
        h.monitor.ingest(message("c", 7, "policy headline here score:4", 0));
        h.monitor.tick().await;
        let path = h.storage.path().to_path_buf();
        let before = h.storage.query(crate::report::digest::day_range(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            FixedOffset::east_opt(0).unwrap(),
        ), 0);
        let dir = h.dir;
        drop(h.monitor);
        drop(h.storage);

        let storage = Arc::new(Storage::open(&path).await.unwrap());
        let backend = Arc::new(ScriptedBackend::new(|r| Ok(respond_all(r))));
        let h = harness_on(
            dir,
            storage,
            backend.clone(),
            monitor_settings(),
            crate::notify::testing::RecordingSink::new("recording"),
        );

        let after = h.storage.query(crate::report::digest::day_range(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            FixedOffset::east_opt(0).unwrap(),
        ), 0);
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_eq!(before[0].1, after[0].1);

        assert_eq!(
            h.monitor.ingest(message("c", 7, "policy headline here score:4", 0)),
            Admission::Known
        );
        let report = h.monitor.tick().await;
        assert_eq!(report.analyzed, 0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_tick_does_not_stop_next() {
        let broken = Arc::new(AtomicBool::new(true));
        let flag = broken.clone();
        let backend = Arc::new(ScriptedBackend::new(move |r| {
            if flag.load(Ordering::SeqCst) {
                Err(BackendError::Terminal("401".into()))
            } else {
                Ok(respond_all(r))
            }
        }));
        let h = harness_with(backend, monitor_settings()).await;

        h.monitor.ingest(message("c", 1, "first tick message score:5", 0));
        let first = h.monitor.tick().await;
        assert_eq!(first.failed, 1);
        assert_eq!(first.stored, 0);
        assert!(!h.storage.exists(&MessageKey::new("c", 1)));

        broken.store(false, Ordering::SeqCst);
        h.monitor.ingest(message("c", 1, "first tick message score:5", 0));
        h.monitor.ingest(message("c", 2, "second tick message score:4", 1));
        let second = h.monitor.tick().await;
        assert_eq!(second.stored, 2);
        assert_eq!(second.notified, 2);
        assert_eq!(h.monitor.totals().failed, 1);
        assert_eq!(h.monitor.totals().stored, 2);
    }

    #[tokio::test]
    async fn test_buffer_overflow_evicts_oldest() {
        let mut settings = monitor_settings();
        settings.max_buffered = 2;
        let h = harness_with(
            Arc::new(ScriptedBackend::new(|r| Ok(respond_all(r)))),
            settings,
        )
        .await;

        h.monitor.ingest(message("c", 1, "message number one", 0));
        h.monitor.ingest(message("c", 2, "message number two", 1));
        assert_eq!(
            h.monitor.ingest(message("c", 3, "message number three", 2)),
            Admission::BufferedWithEviction(MessageKey::new("c", 1))
        );
        assert_eq!(h.monitor.buffered_len(), 2);

        let report = h.monitor.tick().await;
        assert_eq!(report.evicted, 1);
        assert_eq!(report.analyzed, 2);
        assert!(!h.storage.exists(&MessageKey::new("c", 1)));
    }

    #[tokio::test]
    async fn test_state_follows_tick_cycle() {
        let h = harness().await;
        assert_eq!(h.monitor.state(), MonitorState::Idle);
        h.monitor.tick().await;
        assert_eq!(h.monitor.state(), MonitorState::Idle);

        h.monitor.ingest(message("c", 1, "a message worth scoring", 0));
        assert_eq!(h.monitor.state(), MonitorState::Accumulating);
        h.monitor.tick().await;
        assert_eq!(h.monitor.state(), MonitorState::Accumulating);
    }

    #[tokio::test]
    async fn test_empty_report_still_dispatched() {
        let h = harness().await;
        let outcomes = h
            .monitor
            .send_report(Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()))
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_delivered());
        let payloads = h.sink.payloads();
        assert_eq!(payloads[0].kind, PayloadKind::DailyDigest);
        assert!(payloads[0].body.contains(crate::report::generator::NO_EVENTS));
    }

    /// Holds every backend call until released.
    #[derive(Default)]
    struct Gated {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl InferenceBackend for Gated {
        async fn infer(&self, request: &InferenceRequest) -> Result<String, BackendError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(respond_all(request))
        }

        fn model_id(&self) -> &str {
            "gated"
        }
    }

    async fn wait_for_state(monitor: &Monitor, expected: MonitorState) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while monitor.state() != expected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("monitor never reached {}", expected));
    }

    #[tokio::test]
    async fn test_mid_tick_ingest_waits_for_next_tick() {
        let backend = Arc::new(Gated::default());
        let h = harness_with_sink(
            backend.clone(),
            monitor_settings(),
            RecordingSink::slow("slow", Duration::from_millis(200)),
        )
        .await;
        h.monitor.ingest(message("c", 1, "surprise rate decision score:5", 0));

        let monitor = h.monitor.clone();
        let tick = tokio::spawn(async move { monitor.tick().await });
        backend.entered.notified().await;

        assert_eq!(
            h.monitor.ingest(message("c", 2, "arrives while scoring score:5", 1)),
            Admission::Buffered
        );
        assert_eq!(h.monitor.state(), MonitorState::Analyzing);

        backend.release.notify_one();
        wait_for_state(&h.monitor, MonitorState::Dispatching).await;

        let report = tick.await.unwrap();
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(h.monitor.state(), MonitorState::Accumulating);
        assert_eq!(h.monitor.buffered_len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_during_and_after_tick_is_known() {
        let backend = Arc::new(Gated::default());
        let h = harness_with(backend.clone(), monitor_settings()).await;
        let msg = message("c", 1, "surprise rate decision score:5", 0);
        h.monitor.ingest(msg.clone());

        let monitor = h.monitor.clone();
        let tick = tokio::spawn(async move { monitor.tick().await });
        backend.entered.notified().await;
        assert_eq!(h.monitor.ingest(msg.clone()), Admission::Known);

        backend.release.notify_one();
        tick.await.unwrap();
        assert_eq!(h.monitor.ingest(msg), Admission::Known);
        assert_eq!(h.monitor.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_stored_result() {
        let h = harness_with_sink(
            Arc::new(ScriptedBackend::new(|r| Ok(respond_all(r)))),
            monitor_settings(),
            RecordingSink::failing("down"),
        )
        .await;
        h.monitor.ingest(message("c", 1, "export ban announced score:5", 0));

        let report = h.monitor.tick().await;

        assert_eq!(report.stored, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.delivered, 0);
        assert!(h.storage.exists(&MessageKey::new("c", 1)));
        assert_eq!(h.monitor.state(), MonitorState::Accumulating);
    }

    #[tokio::test]
    async fn test_evicted_original_lets_cross_post_through() {
        let mut settings = monitor_settings();
        settings.max_buffered = 1;
        let h = harness_with(
            Arc::new(ScriptedBackend::new(|r| Ok(respond_all(r)))),
            settings,
        )
        .await;
        let text = "Ministry announces new export controls on rare earths";

        h.monitor.ingest(message("chan-a", 1, text, 0));
        h.monitor.ingest(message("chan-a", 2, "an unrelated market update", 1));
        assert_eq!(
            h.monitor.ingest(message("chan-b", 9, text, 2)),
            Admission::BufferedWithEviction(MessageKey::new("chan-a", 2))
        );

        let report = h.monitor.tick().await;
        assert_eq!(report.analyzed, 1);
        assert!(h.storage.exists(&MessageKey::new("chan-b", 9)));
    }

    #[tokio::test]
    async fn test_failed_original_lets_cross_post_through() {
        let h = harness_with(
            Arc::new(ScriptedBackend::new(|r| {
                if r.prompt.contains("chan-a:") {
                    Err(BackendError::Terminal("rejected".into()))
                } else {
                    Ok(respond_all(r))
                }
            })),
            monitor_settings(),
        )
        .await;
        let text = "Ministry announces new export controls on rare earths";

        h.monitor.ingest(message("chan-a", 1, text, 0));
        assert_eq!(h.monitor.tick().await.failed, 1);

        assert_eq!(
            h.monitor.ingest(message("chan-b", 9, text, 2)),
            Admission::Buffered
        );
    }
}
