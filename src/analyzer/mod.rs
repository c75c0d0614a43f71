//! Batched impact scoring.
//!
//! One backend call per batch. A response that does not line up with the
//! request is bisected until the offending item is isolated, so a single
//! bad message never costs the rest of its batch.

pub mod parser;
pub mod prompt;

use crate::backend::{InferenceBackend, InferenceRequest};
use crate::config::{ModelConfig, ReportConfig};
use crate::error::{BackendError, ValidationError};
use crate::models::{AnalysisOutcome, AnalysisResult, Batch, Message};
use chrono::{FixedOffset, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Analyzer tuning.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub max_batch_size: usize,
    pub max_item_chars: usize,
    pub retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub call_timeout: Duration,
    pub concurrency: usize,
    pub market: String,
    pub utc_offset: FixedOffset,
}

impl AnalyzerSettings {
    pub fn from_config(model: &ModelConfig, report: &ReportConfig) -> Self {
        Self {
            max_batch_size: model.max_batch_size.max(1),
            max_item_chars: model.max_item_chars,
            retries: model.retries,
            backoff_base_ms: model.backoff_base_ms,
            backoff_max_ms: model.backoff_max_ms,
            call_timeout: Duration::from_secs(model.timeout_seconds),
            concurrency: model.concurrency.max(1),
            market: model.market.clone(),
            utc_offset: report.offset(),
        }
    }
}

/// Why a call produced no usable results.
enum CallError {
    Backend(BackendError),
    Invalid(ValidationError),
}

pub struct Analyzer {
    backend: Arc<dyn InferenceBackend>,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn InferenceBackend>, settings: AnalyzerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Score every batch, at most `concurrency` calls in flight. Outcomes
    /// come back in input order.
    pub async fn analyze_batches(&self, batches: Vec<Batch>) -> Vec<AnalysisOutcome> {
        let total: usize = batches.iter().map(Batch::len).sum();
        info!(
            "Analyzing {} message(s) in {} batch(es)",
            total,
            batches.len()
        );

        let outcomes: Vec<Vec<AnalysisOutcome>> = futures::stream::iter(batches)
            .map(|batch| async move { self.analyze(&batch).await })
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        outcomes.into_iter().flatten().collect()
    }

    /// Score one batch. Always returns exactly one outcome per message,
    /// in batch order.
    pub async fn analyze(&self, batch: &Batch) -> Vec<AnalysisOutcome> {
        if batch.is_empty() {
            return Vec::new();
        }
        let outcomes = self.analyze_messages(batch.messages.clone()).await;
        debug_assert_eq!(outcomes.len(), batch.len());

        let failed = outcomes.iter().filter(|o| !o.is_scored()).count();
        if failed > 0 {
            warn!("{} of {} message(s) failed analysis", failed, batch.len());
        }
        outcomes
    }

    fn analyze_messages(&self, messages: Vec<Message>) -> BoxFuture<'_, Vec<AnalysisOutcome>> {
        async move {
            match self.call(&messages).await {
                Ok(results) => messages
                    .into_iter()
                    .zip(results)
                    .map(|(message, result)| AnalysisOutcome::scored(message, result))
                    .collect(),

                Err(CallError::Invalid(e)) if messages.len() > 1 => {
                    debug!("Splitting batch of {} after invalid response: {}", messages.len(), e);
                    let mut left = messages;
                    let right = left.split_off(left.len() / 2);
                    let mut outcomes = self.analyze_messages(left).await;
                    outcomes.extend(self.analyze_messages(right).await);
                    outcomes
                }

                Err(CallError::Invalid(e)) => messages
                    .into_iter()
                    .map(|m| {
                        warn!("Message {} yields no valid result: {}", m.key(), e);
                        AnalysisOutcome::failed(m, format!("invalid response: {}", e))
                    })
                    .collect(),

                Err(CallError::Backend(e)) => messages
                    .into_iter()
                    .map(|m| AnalysisOutcome::failed(m, e.to_string()))
                    .collect(),
            }
        }
        .boxed()
    }

    async fn call(&self, messages: &[Message]) -> Result<Vec<AnalysisResult>, CallError> {
        let request = prompt::render_batch(
            messages,
            &self.settings.market,
            self.settings.max_item_chars,
            self.settings.utc_offset,
        );

        let raw = self
            .infer_with_retry(&request)
            .await
            .map_err(CallError::Backend)?;

        let items = parser::parse_response(&raw, messages.len()).map_err(CallError::Invalid)?;

        let analyzed_at = Utc::now();
        let model_version = self.backend.model_id().to_string();

        Ok(messages
            .iter()
            .zip(items)
            .map(|(message, item)| AnalysisResult {
                message_ref: message.key(),
                impact_score: item.impact_score,
                rationale: item.rationale,
                summary: item.summary,
                direction: item.direction,
                affected_sectors: item.affected_sectors,
                action_suggestion: item.action_suggestion,
                analyzed_at,
                model_version: model_version.clone(),
            })
            .collect())
    }

    /// Call the backend, retrying transient failures with capped
    /// exponential backoff.
    pub async fn infer_with_retry(&self, request: &InferenceRequest) -> Result<String, BackendError> {
        let mut delay = self.settings.backoff_base_ms;
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(
                self.settings.call_timeout,
                self.backend.infer(request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Transient(format!(
                    "no response within {}s",
                    self.settings.call_timeout.as_secs()
                ))),
            };

            match result {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_transient() && attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(
                        "Backend call failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        self.settings.retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay = delay.saturating_mul(2).min(self.settings.backoff_max_ms);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
