//! Error taxonomy for the monitoring pipeline.

use thiserror::Error;

/// Errors returned by an inference backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Timeouts, rate limiting, connection resets. Retried with backoff.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Authentication, bad request, unknown model. Never retried.
    #[error("terminal backend error: {0}")]
    Terminal(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// A backend response that does not line up with the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("expected {expected} results, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("result indices do not match request positions: {0}")]
    IndexMismatch(String),

    #[error("item {index}: score {score} outside 0..={max}")]
    ScoreOutOfRange { index: usize, score: i64, max: u8 },

    #[error("item {index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// Storage failures. Scoped to the item being written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("result refers to {result} but message is {message}")]
    KeyMismatch { message: String, result: String },
}

/// A sink failed to deliver a payload.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("{sink}: delivery timed out after {seconds}s")]
    Timeout { sink: String, seconds: u64 },

    #[error("{sink}: {message}")]
    Delivery { sink: String, message: String },
}
