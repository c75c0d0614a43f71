//! Dynamic keyword refresh.
//!
//! Asks the model for the people, places and concepts currently moving
//! markets, writes them to `dynamic_keywords.json` and reloads the filter.

use crate::analyzer::Analyzer;
use crate::backend::InferenceRequest;
use crate::filter::keywords::{KeywordFile, DYNAMIC_KEYWORDS_FILE};
use crate::filter::MessageFilter;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const TRENDS_SYSTEM_PROMPT: &str =
    "You are a global financial intelligence analyst. Answer with JSON only.";

pub struct KeywordRefresher {
    analyzer: Arc<Analyzer>,
    filter: Arc<MessageFilter>,
    dir: PathBuf,
}

impl KeywordRefresher {
    /// Returns `None` when the filter has no keyword directory to write to.
    pub fn new(analyzer: Arc<Analyzer>, filter: Arc<MessageFilter>) -> Option<Self> {
        let dir = filter.keyword_dir()?.to_path_buf();
        Some(Self {
            analyzer,
            filter,
            dir,
        })
    }

    /// Fetch, persist and apply a fresh keyword file.
    pub async fn refresh(&self, today: NaiveDate) -> Result<KeywordFile> {
        info!("Refreshing dynamic keywords for {}", today);

        let request = InferenceRequest {
            json_output: true,
            ..InferenceRequest::completion(TRENDS_SYSTEM_PROMPT, trends_prompt(today))
        };
        let raw = self
            .analyzer
            .infer_with_retry(&request)
            .await
            .context("Keyword refresh request failed")?;

        let file = parse_keyword_file(&raw)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(DYNAMIC_KEYWORDS_FILE);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        let highlights: Vec<&str> = file
            .high
            .values()
            .flatten()
            .take(5)
            .map(String::as_str)
            .collect();
        info!("Dynamic keywords updated; watching {}", highlights.join(", "));

        self.filter.reload();
        Ok(file)
    }
}

fn trends_prompt(today: NaiveDate) -> String {
    format!(
        r#"Today is {}. Based on the current global political and economic situation, list the keywords worth monitoring.

Identify three groups, 3-8 terms each:
1. Key people (HIGH): sitting political or economic leaders with large market influence. Exclude anyone no longer in office.
2. Geopolitical hotspots (HIGH): ongoing conflicts, events or places that can disrupt supply chains or risk sentiment.
3. Hot concepts (MEDIUM): technology or economic themes the market has been trading recently.

Respond strictly in this JSON layout:
{{"HIGH": {{"key_people": ["..."], "hotspots": ["..."]}}, "MEDIUM": {{"hot_concepts": ["..."]}}}}"#,
        today.format("%Y-%m-%d")
    )
}

/// Parse a model reply into a keyword file. Code fences are tolerated.
pub fn parse_keyword_file(raw: &str) -> Result<KeywordFile> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &raw[s..=e],
        _ => bail!("Keyword refresh returned no JSON object"),
    };

    let file: KeywordFile =
        serde_json::from_str(json).context("Keyword refresh returned malformed JSON")?;

    if file.high.values().all(Vec::is_empty) && file.medium.values().all(Vec::is_empty) {
        bail!("Keyword refresh returned no keywords");
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::{settings, ScriptedBackend};
    use crate::config::FilterConfig;
    use crate::error::BackendError;
    use crate::models::fixtures::message;

    fn refresher(
        dir: &std::path::Path,
        reply: Result<String, BackendError>,
    ) -> (KeywordRefresher, Arc<MessageFilter>) {
        let filter = Arc::new(MessageFilter::new(FilterConfig {
            keyword_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }));
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(ScriptedBackend::new(move |_| reply.clone())),
            settings(),
        ));
        (KeywordRefresher::new(analyzer, filter.clone()).unwrap(), filter)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_writes_file_and_reloads_filter() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "```json\n{\"HIGH\": {\"key_people\": [\"Powell\"]}, \"MEDIUM\": {\"hot_concepts\": [\"AI agent\"]}}\n```";
        let (refresher, filter) = refresher(dir.path(), Ok(reply.to_string()));

        let file = refresher.refresh(today()).await.unwrap();
        assert_eq!(file.high["key_people"], vec!["Powell"]);

        let written = std::fs::read_to_string(dir.path().join(DYNAMIC_KEYWORDS_FILE)).unwrap();
        assert!(written.contains("Powell"));
        assert!(!dir.path().join("dynamic_keywords.json.tmp").exists());

        let verdict = filter.check(&message("c", 1, "Powell signals a pause in hikes", 0));
        assert!(matches!(
            verdict,
            crate::filter::FilterVerdict::Admitted {
                priority: crate::filter::Priority::High,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DYNAMIC_KEYWORDS_FILE), r#"{"HIGH": {"p": ["old"]}}"#).unwrap();
        let (refresher, _) = refresher(dir.path(), Err(BackendError::Terminal("401".into())));

        assert!(refresher.refresh(today()).await.is_err());
        let kept = std::fs::read_to_string(dir.path().join(DYNAMIC_KEYWORDS_FILE)).unwrap();
        assert!(kept.contains("old"));
    }

    #[test]
    fn test_parse_rejects_empty_lists() {
        assert!(parse_keyword_file(r#"{"HIGH": {}, "MEDIUM": {"x": []}}"#).is_err());
        assert!(parse_keyword_file("no json").is_err());
    }

    #[test]
    fn test_no_keyword_dir_means_no_refresher() {
        let filter = Arc::new(MessageFilter::new(FilterConfig::default()));
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(ScriptedBackend::new(|_| Ok(String::new()))),
            settings(),
        ));
        assert!(KeywordRefresher::new(analyzer, filter).is_none());
    }
}
