//! Markdown rendering for live alerts and the daily digest.

use crate::models::{AnalysisResult, Message, NotificationPayload, PayloadKind};
use crate::storage::DailyStats;
use chrono::{FixedOffset, NaiveDate};

/// Body used when a digest has nothing to list.
pub const NO_EVENTS: &str = "No significant events";

/// Render a live alert for items already in notification order.
pub fn render_live_alert(items: Vec<(Message, AnalysisResult)>, offset: FixedOffset) -> NotificationPayload {
    let top = items.iter().map(|(_, r)| r.impact_score).max().unwrap_or(0);
    let subject = format!("Market alert: {} high-impact item(s), max score {}", items.len(), top);

    let mut body = String::new();
    for (message, result) in &items {
        body.push_str(&render_alert_item(message, result, offset));
    }

    NotificationPayload {
        kind: PayloadKind::LiveAlert,
        items,
        subject,
        body,
    }
}

fn render_alert_item(message: &Message, result: &AnalysisResult, offset: FixedOffset) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "### {} {}\n\n",
        result.direction.emoji(),
        result.headline()
    ));
    section.push_str(&format!(
        "- **Impact:** {} ({}/{})\n",
        result.score_bar(),
        result.impact_score,
        crate::models::MAX_IMPACT_SCORE
    ));
    section.push_str(&format!("- **Direction:** {}\n", result.direction));
    if !result.affected_sectors.is_empty() {
        let sectors: Vec<&str> = result.affected_sectors.iter().map(String::as_str).take(5).collect();
        section.push_str(&format!("- **Sectors:** {}\n", sectors.join(", ")));
    }
    section.push_str(&format!("- **Why:** {}\n", result.rationale));
    if let Some(action) = &result.action_suggestion {
        section.push_str(&format!("- **Suggestion:** {}\n", action));
    }
    section.push_str(&format!(
        "- **Source:** {} at {}\n\n",
        message.channel_label(),
        message.source_timestamp.with_timezone(&offset).format("%H:%M")
    ));

    section
}

/// Inputs for one digest body.
pub struct DigestView<'a> {
    pub date: NaiveDate,
    pub offset: FixedOffset,
    pub threshold: u8,
    pub stats: &'a DailyStats,
    pub commentary: Option<&'a str>,
    pub groups: &'a [(String, Vec<(Message, AnalysisResult)>)],
    /// Items left out by the cap.
    pub omitted: usize,
}

/// Render the digest body.
pub fn render_digest(view: &DigestView<'_>) -> String {
    let mut output = String::new();

    output.push_str(&generate_overview_section(view.stats, view.threshold));

    if let Some(commentary) = view.commentary {
        output.push_str("### Commentary\n\n");
        output.push_str(commentary.trim());
        output.push_str("\n\n");
    }

    output.push_str(&generate_events_section(view));

    output
}

pub fn digest_subject(date: NaiveDate) -> String {
    format!("Daily market digest | {}", date.format("%Y-%m-%d"))
}

fn generate_overview_section(stats: &DailyStats, threshold: u8) -> String {
    let mut section = String::new();

    let top_sectors = if stats.top_sectors.is_empty() {
        "none".to_string()
    } else {
        stats
            .top_sectors
            .iter()
            .take(5)
            .map(|(s, c)| format!("{}({})", s, c))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    section.push_str("### Overview\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!("| Messages analyzed | {} |\n", stats.total));
    section.push_str(&format!("| Score >= {} | {} |\n", threshold, stats.valuable));
    section.push_str(&format!(
        "| Bullish / Bearish | {}/{} |\n",
        stats.bullish, stats.bearish
    ));
    section.push_str(&format!("| Top sectors | {} |\n\n", top_sectors));

    section
}

fn generate_events_section(view: &DigestView<'_>) -> String {
    let mut section = String::new();

    section.push_str("### Key events\n\n");

    if view.groups.is_empty() {
        section.push_str(NO_EVENTS);
        section.push_str("\n");
        return section;
    }

    for (sector, items) in view.groups {
        section.push_str(&format!("**{}**\n\n", sector));
        for (message, result) in items {
            section.push_str(&format!(
                "- {} [{}] {} ({})\n",
                result.direction.emoji(),
                result.impact_score,
                result.headline(),
                message.source_timestamp.with_timezone(&view.offset).format("%H:%M")
            ));
        }
        section.push_str("\n");
    }

    if view.omitted > 0 {
        section.push_str(&format!("_{} more item(s) not listed._\n", view.omitted));
    }

    section
}
