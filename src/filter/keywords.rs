//! Keyword files for tiering and exclusion.
//!
//! Two files are read from the keyword directory: a hand-maintained
//! `base_keywords.json` and a `dynamic_keywords.json` rewritten by the
//! trend refresher. Both share one layout:
//!
//! ```json
//! { "HIGH": { "category": ["kw", ...] },
//!   "MEDIUM": { "category": ["kw", ...] },
//!   "EXCLUDED": ["kw", ...] }
//! ```

use super::Priority;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{error, warn};

pub const BASE_KEYWORDS_FILE: &str = "base_keywords.json";
pub const DYNAMIC_KEYWORDS_FILE: &str = "dynamic_keywords.json";

/// On-disk layout of a keyword file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordFile {
    #[serde(rename = "HIGH", default)]
    pub high: BTreeMap<String, Vec<String>>,
    #[serde(rename = "MEDIUM", default)]
    pub medium: BTreeMap<String, Vec<String>>,
    #[serde(rename = "EXCLUDED", default)]
    pub excluded: Vec<String>,
}

/// Merged keyword set: keyword -> category.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    pub high: BTreeMap<String, String>,
    pub medium: BTreeMap<String, String>,
    pub excluded: BTreeSet<String>,
}

impl KeywordSet {
    /// Load both keyword files from `dir`. Missing or unreadable files are skipped.
    pub fn load_dir(dir: &Path) -> Self {
        let mut set = KeywordSet::default();

        for name in [BASE_KEYWORDS_FILE, DYNAMIC_KEYWORDS_FILE] {
            let path = dir.join(name);
            if !path.exists() {
                warn!("Keyword file not found: {}", path.display());
                continue;
            }

            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<KeywordFile>(&s).map_err(|e| e.to_string()));

            match parsed {
                Ok(file) => set.merge(file),
                Err(e) => error!("Failed to load keyword file {}: {}", path.display(), e),
            }
        }

        set
    }

    pub fn merge(&mut self, file: KeywordFile) {
        for (category, words) in file.high {
            for word in words.into_iter().filter(|w| !w.is_empty()) {
                self.high.insert(word, category.clone());
            }
        }
        for (category, words) in file.medium {
            for word in words.into_iter().filter(|w| !w.is_empty()) {
                self.medium.insert(word, category.clone());
            }
        }
        self.excluded
            .extend(file.excluded.into_iter().filter(|w| !w.is_empty()));
    }

    pub fn excluded_match(&self, text: &str) -> Option<&str> {
        self.excluded
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Highest tier with any keyword match, its first category and all matches in that tier.
    pub fn classify(&self, text: &str) -> (Priority, Option<String>, Vec<String>) {
        for (tier, map) in [(Priority::High, &self.high), (Priority::Medium, &self.medium)] {
            let matches: Vec<(&String, &String)> =
                map.iter().filter(|(k, _)| text.contains(k.as_str())).collect();

            if let Some((_, category)) = matches.first() {
                let category = Some((*category).clone());
                let words = matches.iter().map(|(k, _)| (*k).clone()).collect();
                return (tier, category, words);
            }
        }

        (Priority::Low, None, Vec::new())
    }
}
