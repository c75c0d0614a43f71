//! Command-line interface argument parsing.
//!
//! Flags left unset fall back to the configuration file, so every option
//! that can also be configured is an `Option` here.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// impact-monitor - score channel messages for market impact with a local LLM
///
/// Reads JSON-lines message records, filters out noise, scores the rest in
/// batches, stores the results and pushes high-impact items to the
/// configured notification sinks. A daily digest summarizes the previous day.
///
/// Examples:
///   relay | impact-monitor
///   impact-monitor --input messages.jsonl --tick-once
///   impact-monitor --report --date 2026-03-01
///   impact-monitor --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON-lines message input ("-" or omitted for stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .impact-monitor.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ollama model used for scoring
    #[arg(short, long, env = "IMPACT_MONITOR_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Minutes between analysis ticks
    #[arg(long, value_name = "MINUTES")]
    pub interval: Option<u64>,

    /// Path of the result log
    #[arg(long, value_name = "FILE")]
    pub storage: Option<PathBuf>,

    /// WeCom group-robot webhook URL
    #[arg(long, value_name = "URL", env = "WECOM_WEBHOOK_URL")]
    pub wecom_webhook_url: Option<String>,

    /// Generic JSON webhook URL
    #[arg(long, value_name = "URL", env = "IMPACT_MONITOR_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Email sender address (also the SMTP login)
    #[arg(long, value_name = "ADDRESS", env = "EMAIL_SENDER")]
    pub email_sender: Option<String>,

    /// SMTP password for the sender account
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// Email recipient address
    #[arg(long, value_name = "ADDRESS", env = "EMAIL_RECEIVER")]
    pub email_receiver: Option<String>,

    /// Send the daily digest once and exit
    #[arg(long, conflicts_with = "tick_once")]
    pub report: bool,

    /// Day to report on (YYYY-MM-DD, default: yesterday)
    #[arg(long, value_name = "DATE", requires = "report")]
    pub date: Option<NaiveDate>,

    /// Read the input to EOF, run a single tick and exit
    #[arg(long)]
    pub tick_once: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .impact-monitor.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        for url in [&self.wecom_webhook_url, &self.webhook_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("Webhook URL must be http(s): {}", url));
            }
        }

        for address in [&self.email_sender, &self.email_receiver].into_iter().flatten() {
            if !address.contains('@') {
                return Err(format!("Not an email address: {}", address));
            }
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 minute".to_string());
        }

        if let Some(path) = self.input_file() {
            if !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// The input file, or `None` for stdin.
    pub fn input_file(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
