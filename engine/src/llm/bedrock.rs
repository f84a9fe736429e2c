//! Bedrock Model Provider
//!
//! Calls the Bedrock Runtime Converse API (`POST /model/{modelId}/converse`)
//! with bearer-token auth. The system prompt travels in the `system` field,
//! tool results are sent back as user turns, and consecutive turns from the
//! same role are merged because Converse requires strict alternation.
//!
//! Reasoning blocks (`reasoningContent`) are returned separately from the
//! answer text.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{FinalAnswer, LLMError, LLMProvider, LLMResponse, Message, MessageRole, Result};
use crate::config::AwsSettings;

pub const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";
const DEFAULT_MAX_TOKENS: u32 = 32_000;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP client tuning, accepted as `client_config` or `boto_client_config`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub read_timeout: Option<u64>,
    pub connect_timeout: Option<u64>,
}

/// Model config keys understood by the Bedrock provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BedrockConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default)]
    pub region_name: Option<String>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub top_p: Option<f32>,

    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default, alias = "boto_client_config")]
    pub client_config: ClientConfig,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region_name: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            endpoint_url: None,
            client_config: ClientConfig::default(),
        }
    }
}

/// Bedrock provider
#[derive(Debug, Clone)]
pub struct BedrockProvider {
    config: BedrockConfig,
    endpoint: String,
    bearer_token: Option<String>,
    client: Client,
}

impl BedrockProvider {
    /// Build a provider from model config and AWS settings.
    ///
    /// Region: `region_name` from the config, then `AWS_REGION`, then the
    /// default. Endpoint: `endpoint_url`, then `BEDROCK_RUNTIME_ENDPOINT`,
    /// then the regional host.
    pub fn new(config: BedrockConfig, aws: &AwsSettings) -> Self {
        let region = config
            .region_name
            .clone()
            .unwrap_or_else(|| aws.region.clone());
        let endpoint = config
            .endpoint_url
            .clone()
            .or_else(|| aws.runtime_endpoint.clone())
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", region));

        let client = Client::builder()
            .timeout(Duration::from_secs(
                config
                    .client_config
                    .read_timeout
                    .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            ))
            .connect_timeout(Duration::from_secs(
                config
                    .client_config
                    .connect_timeout
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer_token: aws.bearer_token.clone(),
            client,
        }
    }

    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn converse_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| LLMError::InvalidRequest(format!("Invalid Bedrock endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| LLMError::InvalidRequest("Bedrock endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["model", self.config.model_id.as_str(), "converse"]);
        Ok(url)
    }

    /// Convert conversation messages into the Converse request shape
    fn build_request(&self, messages: &[Message]) -> ConverseRequest {
        let mut system = Vec::new();
        let mut turns: Vec<ConverseMessage> = Vec::new();

        for msg in messages {
            let (role, text) = match msg.role {
                MessageRole::System => {
                    system.push(TextBlock {
                        text: msg.content.clone(),
                    });
                    continue;
                }
                MessageRole::User => ("user", msg.content.clone()),
                MessageRole::Assistant => ("assistant", msg.content.clone()),
                MessageRole::Tool => (
                    "user",
                    format!(
                        "Tool result ({}):\n{}",
                        msg.tool_call_id.as_deref().unwrap_or("unknown"),
                        msg.content
                    ),
                ),
            };

            match turns.last_mut() {
                Some(last) if last.role == role => last.content.push(ContentBlock::text(text)),
                _ => turns.push(ConverseMessage {
                    role: role.to_string(),
                    content: vec![ContentBlock::text(text)],
                }),
            }
        }

        if turns.first().is_some_and(|t| t.role == "assistant") {
            turns.insert(
                0,
                ConverseMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::text("Continue the conversation.")],
                },
            );
        }

        ConverseRequest {
            messages: turns,
            system,
            inference_config: InferenceConfig {
                max_tokens: self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                temperature: self.config.temperature,
                top_p: self.config.top_p,
            },
        }
    }
}

#[async_trait]
impl LLMProvider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse> {
        let request = self.build_request(messages);
        let url = self.converse_url()?;

        tracing::debug!(
            "Bedrock request: model={}, turns={}",
            self.config.model_id,
            request.messages.len()
        );

        let mut builder = self.client.post(url).json(&request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let start = std::time::Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::Timeout
            } else if e.is_connect() {
                LLMError::ProviderUnavailable(format!(
                    "Cannot connect to Bedrock at {}",
                    self.endpoint
                ))
            } else {
                LLMError::NetworkError(e.to_string())
            }
        })?;

        tracing::info!(
            "Bedrock response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::AuthenticationFailed(body)
                }
                StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimitExceeded,
                StatusCode::BAD_REQUEST => LLMError::InvalidRequest(body),
                _ => LLMError::ProviderUnavailable(format!(
                    "Bedrock API error ({}): {}",
                    status, body
                )),
            });
        }

        let parsed: ConverseResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Bedrock response: {}", e)))?;

        let mut text = String::new();
        let mut reasoning = String::new();
        for block in parsed.output.message.content {
            if let Some(t) = block.text {
                text.push_str(&t);
            }
            if let Some(r) = block.reasoning_content.and_then(|r| r.reasoning_text) {
                reasoning.push_str(&r.text);
            }
        }

        if let Some(tool_call) = super::parse_tool_calls(&text) {
            Ok(LLMResponse::ToolCall(tool_call))
        } else {
            Ok(LLMResponse::FinalAnswer(
                FinalAnswer::new(text).with_reasoning(reasoning),
            ))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    text: String,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    text: String,
}

impl ContentBlock {
    fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    reasoning_content: Option<ReasoningContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReasoningContent {
    #[serde(default)]
    reasoning_text: Option<ReasoningText>,
}

#[derive(Debug, Deserialize)]
struct ReasoningText {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(config: BedrockConfig) -> BedrockProvider {
        BedrockProvider::new(config, &AwsSettings::default())
    }

    #[test]
    fn test_defaults() {
        let p = provider(BedrockConfig::default());
        assert_eq!(p.name(), "bedrock");
        assert_eq!(p.model_id(), DEFAULT_MODEL_ID);
        assert!(!p.is_local());
        assert_eq!(p.endpoint(), "https://bedrock-runtime.us-west-2.amazonaws.com");
    }

    #[test]
    fn test_region_from_config() {
        let p = provider(BedrockConfig {
            region_name: Some("eu-west-1".to_string()),
            ..Default::default()
        });
        assert_eq!(p.endpoint(), "https://bedrock-runtime.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_config_accepts_boto_client_config() {
        let config: BedrockConfig = serde_json::from_value(serde_json::json!({
            "model_id": "anthropic.claude-3-5-sonnet-20241022-v2:0",
            "boto_client_config": {"read_timeout": 900, "connect_timeout": 60}
        }))
        .unwrap();
        assert_eq!(config.client_config.read_timeout, Some(900));
        assert_eq!(config.client_config.connect_timeout, Some(60));
    }

    #[test]
    fn test_converse_url_keeps_model_id() {
        let p = provider(BedrockConfig {
            endpoint_url: Some("http://localhost:9000/".to_string()),
            ..Default::default()
        });
        let url = p.converse_url().unwrap();
        assert!(url.as_str().starts_with("http://localhost:9000/model/"));
        assert!(url.as_str().ends_with("/converse"));
    }

    #[test]
    fn test_build_request_merges_and_extracts_system() {
        let p = provider(BedrockConfig::default());
        let messages = vec![
            Message::system("be nice"),
            Message::user("hi"),
            Message::assistant(r#"{"function": "shell", "arguments": {}}"#),
            Message::tool_result("done", "call_1"),
            Message::user("thanks"),
        ];
        let request = p.build_request(&messages);

        assert_eq!(request.system.len(), 1);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[1].role, "assistant");
        assert_eq!(request.messages[2].role, "user");
        assert_eq!(request.messages[2].content.len(), 2);
        assert!(request.messages[2].content[0].text.contains("call_1"));
    }

    #[test]
    fn test_build_request_starts_with_user() {
        let p = provider(BedrockConfig::default());
        let request = p.build_request(&[Message::assistant("earlier"), Message::user("now")]);
        assert_eq!(request.messages[0].role, "user");
    }
}
