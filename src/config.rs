//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.impact-monitor.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".impact-monitor.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler settings.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Message filter settings.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Model and analyzer settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification sinks.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Daily digest settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Dynamic keyword refresh.
    #[serde(default)]
    pub trends: TrendsConfig,
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Minutes between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_minutes: u64,

    /// Minimum score for a live alert.
    #[serde(default = "default_push_threshold")]
    pub push_threshold: u8,

    /// Capacity of the transport queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Oldest messages are evicted past this many buffered messages.
    #[serde(default = "default_max_buffered")]
    pub max_buffered_messages: usize,

    /// How long an in-flight tick may run after shutdown is requested.
    #[serde(default = "default_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_minutes: default_tick_interval(),
            push_threshold: default_push_threshold(),
            queue_capacity: default_queue_capacity(),
            max_buffered_messages: default_max_buffered(),
            shutdown_grace_seconds: default_grace(),
        }
    }
}

fn default_tick_interval() -> u64 {
    5
}

fn default_push_threshold() -> u8 {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_buffered() -> usize {
    500
}

fn default_grace() -> u64 {
    30
}

/// How the filter treats messages that pass the exclusion rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Classify admitted messages by keyword tier.
    #[default]
    Standard,
    /// Only apply exclusions; everything else goes to the model untiered.
    AiOnly,
}

/// Message filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub mode: FilterMode,

    /// Minimum trimmed length in characters.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Messages with more URLs than this are treated as promotional.
    #[serde(default = "default_max_url_count")]
    pub max_url_count: usize,

    /// Regex block-list.
    #[serde(default)]
    pub block_patterns: Vec<String>,

    /// Substring block-list.
    #[serde(default)]
    pub block_keywords: Vec<String>,

    /// Cross-post suppression window. Zero disables it.
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_minutes: u64,

    /// Directory holding `base_keywords.json` and `dynamic_keywords.json`.
    #[serde(default)]
    pub keyword_dir: Option<PathBuf>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Standard,
            min_length: default_min_length(),
            max_url_count: default_max_url_count(),
            block_patterns: Vec::new(),
            block_keywords: Vec::new(),
            duplicate_window_minutes: default_duplicate_window(),
            keyword_dir: None,
        }
    }
}

fn default_min_length() -> usize {
    10
}

fn default_max_url_count() -> usize {
    3
}

fn default_duplicate_window() -> u64 {
    30
}

/// LLM model and analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient errors.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// First backoff delay in milliseconds; doubles each retry.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Maximum messages per backend call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Messages are truncated to this many characters in the prompt.
    #[serde(default = "default_max_item_chars")]
    pub max_item_chars: usize,

    /// Batches analyzed concurrently within one tick.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Market the scores are relative to.
    #[serde(default = "default_market")]
    pub market: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            max_batch_size: default_max_batch_size(),
            max_item_chars: default_max_item_chars(),
            concurrency: default_concurrency(),
            market: default_market(),
        }
    }
}

fn default_model() -> String {
    "qwen2.5:14b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    3
}

fn default_backoff_base() -> u64 {
    2000
}

fn default_backoff_max() -> u64 {
    60_000
}

fn default_max_batch_size() -> usize {
    20
}

fn default_max_item_chars() -> usize {
    200
}

fn default_concurrency() -> usize {
    1
}

fn default_market() -> String {
    "China A-share market".to_string()
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only record log.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/impact_records.jsonl")
}

/// Notification sinks. Each configured sink is attempted independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Per-send timeout in seconds.
    #[serde(default = "default_notify_timeout")]
    pub timeout_seconds: u64,

    /// Bodies longer than this are truncated.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// WeCom group-robot webhook (markdown messages).
    #[serde(default)]
    pub wecom_webhook_url: Option<String>,

    /// Generic JSON webhook.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Directory that receives one markdown file per payload.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// SMTP server (implicit TLS).
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Sender address, also the SMTP login.
    #[serde(default)]
    pub email_sender: Option<String>,

    #[serde(default)]
    pub email_password: Option<String>,

    #[serde(default)]
    pub email_receiver: Option<String>,
}

impl NotificationConfig {
    /// Email is enabled only when sender, password and receiver are all set.
    pub fn email_settings(&self) -> Option<crate::notify::EmailSettings> {
        match (&self.email_sender, &self.email_password, &self.email_receiver) {
            (Some(sender), Some(password), Some(receiver)) => Some(crate::notify::EmailSettings {
                server: self.smtp_server.clone(),
                port: self.smtp_port,
                sender: sender.clone(),
                password: password.clone(),
                receiver: receiver.clone(),
            }),
            _ => None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_notify_timeout(),
            max_body_chars: default_max_body_chars(),
            wecom_webhook_url: None,
            webhook_url: None,
            output_dir: None,
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            email_sender: None,
            email_password: None,
            email_receiver: None,
        }
    }
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_max_body_chars() -> usize {
    3800
}

fn default_smtp_server() -> String {
    "smtp.qq.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

/// Daily digest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Send the digest automatically while monitoring.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum score listed in the digest.
    #[serde(default = "default_digest_threshold")]
    pub digest_threshold: u8,

    /// Local send time.
    #[serde(default = "default_report_hour")]
    pub hour: u32,

    #[serde(default = "default_report_minute")]
    pub minute: u32,

    /// Offset used for day boundaries and rendered times.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Ask the model for a short commentary paragraph.
    #[serde(default = "default_true")]
    pub commentary: bool,

    /// Cap on listed events.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            digest_threshold: default_digest_threshold(),
            hour: default_report_hour(),
            minute: default_report_minute(),
            utc_offset_hours: default_utc_offset(),
            commentary: true,
            max_items: default_max_items(),
        }
    }
}

impl ReportConfig {
    /// Fixed offset for day boundaries. Out-of-range hours fall back to UTC.
    pub fn offset(&self) -> chrono::FixedOffset {
        use chrono::Offset;
        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| chrono::Utc.fix())
    }
}

fn default_true() -> bool {
    true
}

fn default_digest_threshold() -> u8 {
    3
}

fn default_report_hour() -> u32 {
    8
}

fn default_report_minute() -> u32 {
    30
}

fn default_utc_offset() -> i32 {
    8
}

fn default_max_items() -> usize {
    20
}

/// Dynamic keyword refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_trends_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: default_trends_hour(),
            minute: 0,
        }
    }
}

fn default_trends_hour() -> u32 {
    6
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides an explicit value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(interval) = args.interval {
            self.monitor.tick_interval_minutes = interval;
        }
        if let Some(ref path) = args.storage {
            self.storage.path = path.clone();
        }
        if let Some(ref url) = args.wecom_webhook_url {
            self.notification.wecom_webhook_url = Some(url.clone());
        }
        if let Some(ref url) = args.webhook_url {
            self.notification.webhook_url = Some(url.clone());
        }
        if let Some(ref sender) = args.email_sender {
            self.notification.email_sender = Some(sender.clone());
        }
        if let Some(ref password) = args.email_password {
            self.notification.email_password = Some(password.clone());
        }
        if let Some(ref receiver) = args.email_receiver {
            self.notification.email_receiver = Some(receiver.clone());
        }
    }

    /// Configuration problems worth warning about at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.monitor.push_threshold > crate::models::MAX_IMPACT_SCORE {
            warnings.push(format!(
                "push_threshold {} is above the maximum score; no live alerts will be sent",
                self.monitor.push_threshold
            ));
        }
        if self.notification.wecom_webhook_url.is_none()
            && self.notification.webhook_url.is_none()
            && self.notification.output_dir.is_none()
            && self.notification.email_settings().is_none()
        {
            warnings.push("No notification sink configured (wecom/webhook/email/output_dir)".to_string());
        }
        if self.notification.email_sender.is_some() != self.notification.email_receiver.is_some() {
            warnings.push("Email needs both email_sender and email_receiver; email disabled".to_string());
        }
        if self.monitor.tick_interval_minutes == 0 {
            warnings.push("tick_interval_minutes is 0; using 1 minute".to_string());
        }

        warnings
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
