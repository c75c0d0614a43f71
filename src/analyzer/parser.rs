//! Parsing and validation of batched scoring responses.

use crate::error::ValidationError;
use crate::models::{ImpactDirection, MAX_IMPACT_SCORE};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// A validated item, still detached from its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub impact_score: u8,
    pub rationale: String,
    pub summary: String,
    pub direction: ImpactDirection,
    pub affected_sectors: BTreeSet<String>,
    pub action_suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    impact_score: Option<Value>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    affected_sectors: Option<Vec<String>>,
    #[serde(default)]
    action_suggestion: Option<String>,
}

/// Parse a response for a batch of `expected` items into results aligned
/// with the request order.
pub fn parse_response(raw: &str, expected: usize) -> Result<Vec<ScoredItem>, ValidationError> {
    let json = extract_json(raw).ok_or(ValidationError::NoJson)?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let items_value = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("items")
            .ok_or(ValidationError::MissingField {
                index: 0,
                field: "items",
            })?,
        _ => return Err(ValidationError::Malformed("expected object or array".to_string())),
    };

    let raw_items: Vec<RawItem> = serde_json::from_value(items_value)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    if raw_items.len() != expected {
        return Err(ValidationError::CountMismatch {
            expected,
            actual: raw_items.len(),
        });
    }

    let ordered = align_by_index(raw_items)?;

    ordered
        .into_iter()
        .enumerate()
        .map(|(pos, item)| validate_item(pos + 1, item))
        .collect()
}

/// Strip code fences and cut out the outermost JSON value.
fn extract_json(raw: &str) -> Option<&str> {
    let text = raw.trim();
    let obj = text.find('{').zip(text.rfind('}'));
    let arr = text.find('[').zip(text.rfind(']'));

    let (start, end) = match (obj, arr) {
        (Some(o), Some(a)) if a.0 < o.0 => a,
        (Some(o), _) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    (end > start).then(|| &text[start..=end])
}

/// Re-order by echoed index when every item carries one. Positional
/// order is kept otherwise, but any index that is present must agree with
/// its position.
fn align_by_index(items: Vec<RawItem>) -> Result<Vec<RawItem>, ValidationError> {
    let n = items.len();

    if items.iter().all(|i| i.index.is_some()) {
        let mut slots: Vec<Option<RawItem>> = (0..n).map(|_| None).collect();
        for item in items {
            let index = item.index.unwrap_or_default();
            if index == 0 || index > n {
                return Err(ValidationError::IndexMismatch(format!(
                    "index {} outside 1..={}",
                    index, n
                )));
            }
            let slot = &mut slots[index - 1];
            if slot.is_some() {
                return Err(ValidationError::IndexMismatch(format!(
                    "index {} repeated",
                    index
                )));
            }
            *slot = Some(item);
        }
        return Ok(slots.into_iter().flatten().collect());
    }

    for (pos, item) in items.iter().enumerate() {
        if let Some(index) = item.index {
            if index != pos + 1 {
                return Err(ValidationError::IndexMismatch(format!(
                    "index {} at position {}",
                    index,
                    pos + 1
                )));
            }
        }
    }
    Ok(items)
}

fn validate_item(index: usize, item: RawItem) -> Result<ScoredItem, ValidationError> {
    let score_value = item.impact_score.ok_or(ValidationError::MissingField {
        index,
        field: "impact_score",
    })?;

    let score = match &score_value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or(ValidationError::MissingField {
        index,
        field: "impact_score",
    })?;

    if !(0..=MAX_IMPACT_SCORE as i64).contains(&score) {
        return Err(ValidationError::ScoreOutOfRange {
            index,
            score,
            max: MAX_IMPACT_SCORE,
        });
    }

    let rationale = item
        .rationale
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or(ValidationError::MissingField {
            index,
            field: "rationale",
        })?;

    let affected_sectors = item
        .affected_sectors
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(ScoredItem {
        impact_score: score as u8,
        rationale,
        summary: item.summary.map(|s| s.trim().to_string()).unwrap_or_default(),
        direction: item
            .direction
            .as_deref()
            .map(ImpactDirection::parse_lenient)
            .unwrap_or_default(),
        affected_sectors,
        action_suggestion: item
            .action_suggestion
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}
