//! Daily digest assembly.

use super::generator::{self, DigestView};
use crate::analyzer::Analyzer;
use crate::backend::InferenceRequest;
use crate::config::ReportConfig;
use crate::models::{AnalysisResult, Message, NotificationPayload, PayloadKind};
use crate::storage::{DailyStats, Storage};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::{info, warn};

/// Sector label for results without one.
pub const UNCLASSIFIED: &str = "Unclassified";

const COMMENTARY_SYSTEM_PROMPT: &str =
    "You are a market strategist writing a brief morning note. Be concise and concrete.";

/// Digest settings.
#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub threshold: u8,
    pub offset: FixedOffset,
    pub max_items: usize,
    pub commentary: bool,
}

impl From<&ReportConfig> for DigestSettings {
    fn from(config: &ReportConfig) -> Self {
        Self {
            threshold: config.digest_threshold,
            offset: config.offset(),
            max_items: config.max_items.max(1),
            commentary: config.commentary,
        }
    }
}

pub struct DailyReportBuilder {
    storage: Arc<Storage>,
    settings: DigestSettings,
    /// Used for the commentary paragraph only.
    analyzer: Option<Arc<Analyzer>>,
}

impl DailyReportBuilder {
    pub fn new(storage: Arc<Storage>, settings: DigestSettings, analyzer: Option<Arc<Analyzer>>) -> Self {
        Self {
            storage,
            settings,
            analyzer,
        }
    }

    /// The local day before the one containing `now`.
    pub fn previous_day(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.with_timezone(&self.settings.offset).date_naive();
        today.pred_opt().unwrap_or(today)
    }

    /// Build the digest for one local day. Never fails: an empty day still
    /// yields a payload.
    pub async fn build(&self, date: NaiveDate) -> NotificationPayload {
        let range = day_range(date, self.settings.offset);
        let rows = self.storage.query(range.clone(), self.settings.threshold);
        let stats = self.storage.daily_stats(range, self.settings.threshold);

        info!(
            "Building digest for {}: {} item(s) at score >= {}",
            date,
            rows.len(),
            self.settings.threshold
        );

        let mut ranked = rows;
        // Stable: equal scores stay in chronological order.
        ranked.sort_by(|a, b| b.1.impact_score.cmp(&a.1.impact_score));
        let omitted = ranked.len().saturating_sub(self.settings.max_items);
        ranked.truncate(self.settings.max_items);

        let commentary = if self.settings.commentary && !ranked.is_empty() {
            self.commentary(date, &ranked, &stats).await
        } else {
            None
        };

        let groups = group_by_sector(&ranked);
        let body = generator::render_digest(&DigestView {
            date,
            offset: self.settings.offset,
            threshold: self.settings.threshold,
            stats: &stats,
            commentary: commentary.as_deref(),
            groups: &groups,
            omitted,
        });

        NotificationPayload {
            kind: PayloadKind::DailyDigest,
            items: ranked,
            subject: generator::digest_subject(date),
            body,
        }
    }

    async fn commentary(
        &self,
        date: NaiveDate,
        items: &[(Message, AnalysisResult)],
        stats: &DailyStats,
    ) -> Option<String> {
        let analyzer = self.analyzer.as_ref()?;
        let request = InferenceRequest::completion(
            COMMENTARY_SYSTEM_PROMPT,
            commentary_prompt(date, items, stats),
        );

        match analyzer.infer_with_retry(&request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("Digest commentary came back empty; section omitted");
                None
            }
            Err(e) => {
                warn!("Digest commentary failed; section omitted: {}", e);
                None
            }
        }
    }
}

/// Half-open UTC range covering `date` in the given offset.
pub fn day_range(date: NaiveDate, offset: FixedOffset) -> Range<DateTime<Utc>> {
    let start = local_midnight(date, offset);
    let end = date
        .succ_opt()
        .map(|next| local_midnight(next, offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    start..end
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Group ranked items under their first sector. Groups are ordered by
/// their best item, items keep the incoming order.
pub fn group_by_sector(
    items: &[(Message, AnalysisResult)],
) -> Vec<(String, Vec<(Message, AnalysisResult)>)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<(Message, AnalysisResult)>> = HashMap::new();

    for (message, result) in items {
        let sector = result
            .affected_sectors
            .iter()
            .next()
            .cloned()
            .unwrap_or_else(|| UNCLASSIFIED.to_string());

        if !grouped.contains_key(&sector) {
            order.push(sector.clone());
        }
        grouped
            .entry(sector)
            .or_default()
            .push((message.clone(), result.clone()));
    }

    order
        .into_iter()
        .filter_map(|sector| grouped.remove(&sector).map(|items| (sector, items)))
        .collect()
}

fn commentary_prompt(date: NaiveDate, items: &[(Message, AnalysisResult)], stats: &DailyStats) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("## Market digest for {}\n\n", date));
    prompt.push_str(&format!("- Messages analyzed: {}\n", stats.total));
    prompt.push_str(&format!("- Significant: {}\n", stats.valuable));
    prompt.push_str(&format!(
        "- Bullish / bearish: {} / {}\n",
        stats.bullish, stats.bearish
    ));
    let sectors: Vec<&str> = stats.top_sectors.iter().take(5).map(|(s, _)| s.as_str()).collect();
    prompt.push_str(&format!("- Top sectors: {}\n\n", sectors.join(", ")));

    prompt.push_str("### Key events\n");
    for (i, (_, result)) in items.iter().enumerate() {
        let sectors: Vec<&str> = result.affected_sectors.iter().take(3).map(String::as_str).collect();
        prompt.push_str(&format!(
            "{}. [{}][{}] {} | {}\n",
            i + 1,
            result.direction,
            result.impact_score,
            result.headline(),
            sectors.join(", ")
        ));
    }

    prompt.push_str(
        "\nWrite a short note: overall sentiment in one sentence, the three core events, \
         sectors to watch, and the main risks. Plain markdown, no preamble.",
    );
    prompt
}
