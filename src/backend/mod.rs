//! Inference backend port.
//!
//! The analyzer renders prompts and parses responses; a backend only moves
//! text to a model and back, classifying its failures as transient or terminal.

pub mod ollama;

pub use ollama::{OllamaBackend, OllamaSettings};

use crate::error::BackendError;
use async_trait::async_trait;

/// One request to the model.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Role instructions.
    pub system: String,
    /// Fully rendered user prompt.
    pub prompt: String,
    /// Item texts in request order; empty for free-form completions.
    pub items: Vec<String>,
    /// Ask the backend to constrain output to JSON.
    pub json_output: bool,
}

impl InferenceRequest {
    /// A free-form completion with no batched items.
    pub fn completion(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            items: Vec::new(),
            json_output: false,
        }
    }
}

/// A model that turns a prompt into raw response text.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one inference call and return the raw text.
    async fn infer(&self, request: &InferenceRequest) -> Result<String, BackendError>;

    /// Model identifier recorded on every result.
    fn model_id(&self) -> &str;
}
