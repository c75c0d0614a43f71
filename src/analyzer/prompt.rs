//! Prompt rendering for batched scoring.

use crate::backend::InferenceRequest;
use crate::models::{Message, MAX_IMPACT_SCORE};
use chrono::FixedOffset;

/// System prompt for batched scoring.
pub const SCORING_SYSTEM_PROMPT: &str = r#"You are a macro analyst who rates how strongly news items may move a financial market.
Score every item, never skip one, and answer with JSON only."#;

/// Render the batch into one request. Items are numbered from 1 and the
/// model must echo that number as `index`.
pub fn render_batch(
    messages: &[Message],
    market: &str,
    max_item_chars: usize,
    offset: FixedOffset,
) -> InferenceRequest {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Rate the potential impact of each message below on the {}.\n\n",
        market
    ));
    prompt.push_str(&format!("Scoring scale (integer 0-{}):\n", MAX_IMPACT_SCORE));
    prompt.push_str("- 5: major policy or event (rate cuts, sanctions, trade war escalation)\n");
    prompt.push_str("- 4: significant sector news or macro data far from expectations\n");
    prompt.push_str("- 3: ordinary sector news, spill-over from overseas markets\n");
    prompt.push_str("- 1-2: marginal relevance\n");
    prompt.push_str("- 0: unrelated to the market\n\n");

    prompt.push_str(&format!("=== MESSAGES ({}) ===\n\n", messages.len()));
    for (i, msg) in messages.iter().enumerate() {
        let time = msg.source_timestamp.with_timezone(&offset).format("%H:%M");
        prompt.push_str(&format!(
            "[{}] [{}] {}: {}\n\n",
            i + 1,
            time,
            msg.channel_label(),
            truncate_chars(&msg.text, max_item_chars)
        ));
    }
    prompt.push_str("=== END OF MESSAGES ===\n\n");

    prompt.push_str("Respond with exactly this JSON shape:\n");
    prompt.push_str(r#"{"items": [{"index": 1, "impact_score": 0, "summary": "one-line headline", "rationale": "why", "direction": "bullish|bearish|neutral", "affected_sectors": ["sector"], "action_suggestion": "optional"}]}"#);
    prompt.push_str(&format!(
        "\n\nReturn exactly {} items, one per message, in the same order as the input, \
         each carrying the message number as \"index\".",
        messages.len()
    ));

    InferenceRequest {
        system: SCORING_SYSTEM_PROMPT.to_string(),
        prompt,
        items: messages.iter().map(|m| m.text.clone()).collect(),
        json_output: true,
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
