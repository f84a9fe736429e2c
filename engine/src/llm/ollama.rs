//! Ollama Model Provider
//!
//! Talks to a local Ollama server through `/api/chat` (non-streaming).
//! No credentials are involved.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{FinalAnswer, LLMError, LLMProvider, LLMResponse, Message, Result};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL_ID: &str = "llama3.1:8b";

/// Model config keys understood by the Ollama provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OllamaConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model_id: default_model_id(),
            temperature: None,
        }
    }
}

/// Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: Option<f32>,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            model: config.model_id,
            temperature: config.temperature,
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|msg| OllamaMessage {
                role: msg.role.to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse> {
        let ollama_messages = self.convert_messages(messages);

        tracing::debug!(
            "Ollama request: model={}, messages={}, total_chars={}",
            self.model,
            ollama_messages.len(),
            ollama_messages
                .iter()
                .map(|m| m.content.len())
                .sum::<usize>()
        );

        let request = OllamaRequest {
            model: self.model.clone(),
            messages: ollama_messages,
            stream: false,
            options: self.temperature.map(|temperature| OllamaOptions { temperature }),
        };

        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else if e.is_connect() {
                    LLMError::ProviderUnavailable(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.base_url
                    ))
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        tracing::info!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        let content = ollama_response.message.content;
        if let Some(tool_call) = super::parse_tool_calls(&content) {
            Ok(LLMResponse::ToolCall(tool_call))
        } else {
            let answer = FinalAnswer::new(content);
            Ok(LLMResponse::FinalAnswer(match ollama_response.message.thinking {
                Some(thinking) => answer.with_reasoning(thinking),
                None => answer,
            }))
        }
    }

    async fn check_health(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}
