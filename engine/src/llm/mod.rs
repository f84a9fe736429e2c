//! Model Provider Abstraction Layer
//!
//! Common interface over the model backends the CLI can load (Bedrock,
//! Ollama). The agent loop only talks to [`LLMProvider`]; the concrete
//! provider is picked at startup by [`loader::load_model`].
//!
//! Tool calls use a plain-text protocol: the model answers with a JSON object
//! `{"function": "...", "arguments": {...}}` and [`parse_tool_calls`] picks it
//! out of the reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod bedrock;
pub mod loader;
pub mod ollama;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,

    /// Optional tool call ID for tool result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Response from a model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// Model wants to call a tool
    ToolCall(ToolCall),

    /// Model has produced its answer for the turn
    FinalAnswer(FinalAnswer),
}

/// Tool call request from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Arguments as a JSON string
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Final answer from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,

    /// Reasoning text, for models that expose it separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl FinalAnswer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        self.reasoning = if reasoning.trim().is_empty() {
            None
        } else {
            Some(reasoning)
        };
        self
    }
}

/// Model provider trait that all backends implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name (e.g., "bedrock", "ollama")
    fn name(&self) -> &str;

    /// Model identifier sent to the backend
    fn model_id(&self) -> &str;

    /// True for providers running on the local machine
    fn is_local(&self) -> bool;

    /// Generate a response for the conversation.
    ///
    /// `messages` may start with a system message; providers that carry the
    /// system prompt out of band extract it themselves.
    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse>;

    /// Check if the provider is currently reachable
    async fn check_health(&self) -> bool {
        true
    }
}

/// Parse a tool call out of model output.
///
/// Recognized shapes, tried in order:
/// 1. The whole reply is `{"function": "...", "arguments": {...}}`
/// 2. The same object inside a markdown code fence
/// 3. `<tool_call>name({...})</tool_call>`
/// 4. The object embedded somewhere in prose
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find("<tool_call>"), trimmed.find("</tool_call>")) {
        let body = trimmed.get(start + "<tool_call>".len()..end)?;
        let paren = body.find('(')?;
        let args_end = body.rfind(')').unwrap_or(body.len());
        return Some(ToolCall::new(
            new_call_id(),
            body[..paren].trim(),
            &body[paren + 1..args_end],
        ));
    }

    let pos = trimmed.find("{\"function\"")?;
    extract_balanced_json(&trimmed[pos..]).and_then(try_parse_function_json)
}

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4())
}

fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json.get("arguments")?;
    Some(ToolCall::new(new_call_id(), function, arguments.to_string()))
}

/// Body of the first fenced block, skipping the language tag line
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }
    Some(&content[body_start..body_end])
}

/// Balanced `{...}` prefix of `s`, honoring string literals
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
