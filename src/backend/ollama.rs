//! Ollama chat API backend.

use super::{InferenceBackend, InferenceRequest};
use crate::config::ModelConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for Ollama.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl From<&ModelConfig> for OllamaSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Backend that talks to a local or remote Ollama server.
pub struct OllamaBackend {
    settings: OllamaSettings,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(settings: OllamaSettings) -> Result<Self, BackendError> {
        info!(
            "Initializing Ollama backend: model {} at {}",
            settings.model_name, settings.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Terminal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn classify_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Transient(format!(
                "Request timed out after {}s",
                self.settings.timeout_seconds
            ))
        } else if e.is_connect() {
            BackendError::Transient(format!(
                "Cannot connect to Ollama at {}",
                self.settings.ollama_url
            ))
        } else {
            BackendError::Transient(format!("Failed to send request: {}", e))
        }
    }
}

/// Map a non-success HTTP status to an error class.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("Ollama API error {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        BackendError::Transient(message)
    } else {
        BackendError::Terminal(message)
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.settings.ollama_url.trim_end_matches('/'));

        let body = OllamaChatRequest {
            model: &self.settings.model_name,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            stream: false,
            format: request.json_output.then_some("json"),
            options: OllamaOptions {
                temperature: self.settings.temperature,
            },
        };

        debug!(
            "Sending chat request ({} items, {} prompt chars)",
            request.items.len(),
            request.prompt.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Transient(format!("Failed to read Ollama response: {}", e)))?;

        Ok(chat_response.message.content)
    }

    fn model_id(&self) -> &str {
        &self.settings.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, "model not found").is_transient());
    }

    #[test]
    fn test_request_serialization() {
        let body = OllamaChatRequest {
            model: "m",
            messages: vec![],
            stream: false,
            format: Some("json"),
            options: OllamaOptions { temperature: 0.3 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);

        let free = OllamaChatRequest {
            format: None,
            ..body
        };
        assert!(serde_json::to_value(&free).unwrap().get("format").is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = ModelConfig::default();
        let settings = OllamaSettings::from(&config);
        assert_eq!(settings.model_name, config.name);
        assert_eq!(settings.timeout_seconds, 120);
    }
}
