//! Message filter.
//!
//! Decides which messages are worth paying for inference on. The rule
//! pipeline is pure; the only state is the keyword set (reloadable) and the
//! trailing window used to suppress cross-posted duplicates.

pub mod keywords;

use crate::config::{FilterConfig, FilterMode};
use crate::models::{Message, MessageKey};
use chrono::{DateTime, Duration, Utc};
use keywords::KeywordSet;
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Keyword tier of an admitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Why a message was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Undecodable,
    TooShort { length: usize, min: usize },
    TooManyUrls { count: usize, max: usize },
    Blocked(String),
    CrossPost { original: MessageKey },
}

/// Result of running a message through the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Admitted {
        priority: Priority,
        category: Option<String>,
        matched: Vec<String>,
    },
    Rejected(RejectReason),
}

impl FilterVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, FilterVerdict::Admitted { .. })
    }
}

#[derive(Debug)]
struct SeenText {
    fingerprint: u64,
    key: MessageKey,
    observed_at: DateTime<Utc>,
}

/// The message filter.
pub struct MessageFilter {
    config: FilterConfig,
    patterns: Vec<Regex>,
    url_pattern: Regex,
    keywords: RwLock<KeywordSet>,
    recent: Mutex<VecDeque<SeenText>>,
}

impl MessageFilter {
    /// Build a filter. Invalid regexes are skipped with a warning.
    pub fn new(config: FilterConfig) -> Self {
        let patterns = config
            .block_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid block pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        let filter = Self {
            config,
            patterns,
            url_pattern: build_url_regex(),
            keywords: RwLock::new(KeywordSet::default()),
            recent: Mutex::new(VecDeque::new()),
        };
        filter.reload();
        filter
    }

    /// Re-read the keyword files from the keyword directory.
    pub fn reload(&self) {
        let Some(ref dir) = self.config.keyword_dir else {
            return;
        };

        let set = KeywordSet::load_dir(dir);
        info!(
            "Filter keywords loaded: {} high, {} medium, {} excluded",
            set.high.len(),
            set.medium.len(),
            set.excluded.len()
        );

        match self.keywords.write() {
            Ok(mut guard) => *guard = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }

    pub fn keyword_dir(&self) -> Option<&std::path::Path> {
        self.config.keyword_dir.as_deref()
    }

    /// Admission predicate.
    pub fn admit(&self, message: &Message) -> bool {
        self.check(message).is_admitted()
    }

    /// Run the full policy and explain the decision.
    pub fn check(&self, message: &Message) -> FilterVerdict {
        let verdict = self.evaluate_rules(&message.text);
        if !verdict.is_admitted() {
            return verdict;
        }

        if let Some(original) = self.cross_post_of(message) {
            return FilterVerdict::Rejected(RejectReason::CrossPost { original });
        }

        verdict
    }

    /// The stateless part of the policy.
    fn evaluate_rules(&self, text: &str) -> FilterVerdict {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return FilterVerdict::Rejected(RejectReason::Empty);
        }

        if trimmed.contains('\u{FFFD}') {
            return FilterVerdict::Rejected(RejectReason::Undecodable);
        }

        let length = trimmed.chars().count();
        if length < self.config.min_length {
            return FilterVerdict::Rejected(RejectReason::TooShort {
                length,
                min: self.config.min_length,
            });
        }

        let urls = self.url_pattern.find_iter(trimmed).count();
        if urls > self.config.max_url_count {
            return FilterVerdict::Rejected(RejectReason::TooManyUrls {
                count: urls,
                max: self.config.max_url_count,
            });
        }

        if let Some(keyword) = self
            .config
            .block_keywords
            .iter()
            .find(|k| !k.is_empty() && trimmed.contains(k.as_str()))
        {
            return FilterVerdict::Rejected(RejectReason::Blocked(keyword.clone()));
        }

        if let Some(re) = self.patterns.iter().find(|re| re.is_match(trimmed)) {
            return FilterVerdict::Rejected(RejectReason::Blocked(re.as_str().to_string()));
        }

        let keywords = match self.keywords.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(keyword) = keywords.excluded_match(trimmed) {
            return FilterVerdict::Rejected(RejectReason::Blocked(keyword.to_string()));
        }

        if self.config.mode == FilterMode::AiOnly {
            return FilterVerdict::Admitted {
                priority: Priority::Low,
                category: None,
                matched: Vec::new(),
            };
        }

        let (priority, category, matched) = keywords.classify(trimmed);
        FilterVerdict::Admitted {
            priority,
            category,
            matched,
        }
    }

    /// Returns the key of an earlier message with identical text inside the
    /// window, recording this message if it is new. A message never counts
    /// as a duplicate of itself.
    fn cross_post_of(&self, message: &Message) -> Option<MessageKey> {
        if self.config.duplicate_window_minutes == 0 {
            return None;
        }

        let window = Duration::minutes(self.config.duplicate_window_minutes as i64);
        let fingerprint = fingerprint(&message.text);
        let key = message.key();

        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let horizon = message.observed_at - window;
        while recent.front().is_some_and(|s| s.observed_at < horizon) {
            recent.pop_front();
        }

        let earlier = recent.iter().find(|s| {
            s.fingerprint == fingerprint
                && s.key != key
                && (message.observed_at - s.observed_at).abs() <= window
        });

        if let Some(seen) = earlier {
            debug!("{} duplicates text of {}", key, seen.key);
            return Some(seen.key.clone());
        }

        if !recent.iter().any(|s| s.key == key) {
            recent.push_back(SeenText {
                fingerprint,
                key,
                observed_at: message.observed_at,
            });
        }

        None
    }

    /// Drop the cross-post record of a message that will never be scored,
    /// so a copy from another channel can take its place.
    pub fn forget(&self, key: &MessageKey) {
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.retain(|s| &s.key != key);
    }
}

fn fingerprint(text: &str) -> u64 {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}

fn build_url_regex() -> Regex {
    Regex::new(r#"https?://[^\s<>"']+"#).expect("URL pattern is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::message;

    fn filter_with(config: FilterConfig) -> MessageFilter {
        MessageFilter::new(config)
    }

    fn default_filter() -> MessageFilter {
        filter_with(FilterConfig::default())
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        let filter = default_filter();
        assert_eq!(
            filter.check(&message("c", 1, "   \n\t ", 0)),
            FilterVerdict::Rejected(RejectReason::Empty)
        );
        assert!(!filter.admit(&message("c", 2, "", 0)));
    }

    #[test]
    fn test_rejects_short_text() {
        let filter = default_filter();
        let verdict = filter.check(&message("c", 1, "  too short ", 0));
        assert!(matches!(
            verdict,
            FilterVerdict::Rejected(RejectReason::TooShort { min: 10, .. })
        ));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let filter = default_filter();
        // 6 CJK characters = 18 bytes, still too short
        assert!(!filter.admit(&message("c", 1, "央行宣布降准", 0)));
        assert!(filter.admit(&message("c", 2, "央行宣布全面降准零点五个百分点", 0)));
    }

    #[test]
    fn test_rejects_block_keyword_and_pattern() {
        let filter = filter_with(FilterConfig {
            block_keywords: vec!["join our VIP group".to_string()],
            block_patterns: vec![r"(?i)promo\s+code".to_string()],
            ..FilterConfig::default()
        });

        assert!(matches!(
            filter.check(&message("c", 1, "Limited offer, join our VIP group now", 0)),
            FilterVerdict::Rejected(RejectReason::Blocked(_))
        ));
        assert!(!filter.admit(&message("c", 2, "Use PROMO  code 50OFF for trading signals", 0)));
        assert!(filter.admit(&message("c", 3, "Central bank holds rates steady today", 0)));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let filter = filter_with(FilterConfig {
            block_patterns: vec!["(unclosed".to_string()],
            ..FilterConfig::default()
        });
        assert!(filter.admit(&message("c", 1, "Central bank holds rates steady", 0)));
    }

    #[test]
    fn test_rejects_too_many_urls() {
        let filter = default_filter();
        let text = "deals https://a.example https://b.example https://c.example https://d.example";
        assert!(matches!(
            filter.check(&message("c", 1, text, 0)),
            FilterVerdict::Rejected(RejectReason::TooManyUrls { count: 4, max: 3 })
        ));
    }

    #[test]
    fn test_rejects_undecodable_text() {
        let filter = default_filter();
        assert_eq!(
            filter.check(&message("c", 1, "broken \u{FFFD}\u{FFFD} payload bytes", 0)),
            FilterVerdict::Rejected(RejectReason::Undecodable)
        );
    }

    #[test]
    fn test_cross_post_suppressed_within_window() {
        let filter = default_filter();
        let text = "Ministry announces new export controls on rare earths";

        assert!(filter.admit(&message("chan-a", 10, text, 0)));
        let verdict = filter.check(&message("chan-b", 99, text, 5));
        assert_eq!(
            verdict,
            FilterVerdict::Rejected(RejectReason::CrossPost {
                original: MessageKey::new("chan-a", 10)
            })
        );

        // Outside the 30 minute window the same text is fresh again.
        assert!(filter.admit(&message("chan-c", 1, text, 45)));
    }

    #[test]
    fn test_forgotten_original_frees_its_text() {
        let filter = default_filter();
        let text = "Ministry announces new export controls on rare earths";

        assert!(filter.admit(&message("chan-a", 10, text, 0)));
        filter.forget(&MessageKey::new("chan-a", 10));
        assert!(filter.admit(&message("chan-b", 99, text, 5)));
        assert!(!filter.admit(&message("chan-c", 7, text, 6)));
    }

    #[test]
    fn test_cross_post_window_disabled() {
        let filter = filter_with(FilterConfig {
            duplicate_window_minutes: 0,
            ..FilterConfig::default()
        });
        let text = "Ministry announces new export controls on rare earths";
        assert!(filter.admit(&message("a", 1, text, 0)));
        assert!(filter.admit(&message("b", 1, text, 1)));
    }

    #[test]
    fn test_admit_is_deterministic() {
        let filter = default_filter();
        let msg = message("c", 1, "PBOC cuts the reserve requirement ratio", 0);
        let first = filter.check(&msg);
        for _ in 0..5 {
            assert_eq!(filter.check(&msg), first);
        }

        let rejected = message("c", 2, "short", 0);
        for _ in 0..5 {
            assert!(!filter.admit(&rejected));
        }
    }

    #[test]
    fn test_keyword_tiers_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base_keywords.json"),
            r#"{"HIGH": {"policy": ["rate cut"]}, "MEDIUM": {"tech": ["chip"]}, "EXCLUDED": ["airdrop"]}"#,
        )
        .unwrap();

        let filter = filter_with(FilterConfig {
            keyword_dir: Some(dir.path().to_path_buf()),
            ..FilterConfig::default()
        });

        match filter.check(&message("c", 1, "Surprise rate cut announced this morning", 0)) {
            FilterVerdict::Admitted {
                priority, category, ..
            } => {
                assert_eq!(priority, Priority::High);
                assert_eq!(category.as_deref(), Some("policy"));
            }
            other => panic!("unexpected verdict {:?}", other),
        }
        assert!(!filter.admit(&message("c", 2, "Claim your free airdrop tokens today", 0)));
    }

    #[test]
    fn test_ai_only_mode_skips_tiering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base_keywords.json"),
            r#"{"HIGH": {"policy": ["rate cut"]}}"#,
        )
        .unwrap();

        let filter = filter_with(FilterConfig {
            mode: FilterMode::AiOnly,
            keyword_dir: Some(dir.path().to_path_buf()),
            ..FilterConfig::default()
        });

        assert!(matches!(
            filter.check(&message("c", 1, "Surprise rate cut announced this morning", 0)),
            FilterVerdict::Admitted {
                priority: Priority::Low,
                ..
            }
        ));
    }
}
