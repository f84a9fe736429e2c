//! Agent
//!
//! [`Agent`] is the boundary the REPL and startup code talk to: ask a
//! question, call a tool directly, adjust the system prompt. [`AgentCore`]
//! implements it with a think-act-observe loop over a model provider and the
//! tool registry.

pub mod core;
pub mod working_memory;

pub use core::AgentCore;
pub use working_memory::WorkingMemory;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::Message;
use sdk::errors::EngineError;
use sdk::types::ToolResult;

/// Answer to one query
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub text: String,
    pub reasoning: Option<String>,
    /// Model calls it took
    pub iterations: usize,
}

/// A tool call made by the host rather than the model
#[derive(Debug, Clone)]
pub struct DirectToolCall {
    pub name: String,
    pub arguments: Value,
    /// Whether the call and its result go into the conversation history
    pub record: bool,
    /// Replaces the generated user message when recording
    pub user_message_override: Option<String>,
}

impl DirectToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            record: true,
            user_message_override: None,
        }
    }

    /// Keep the call out of the conversation history
    pub fn unrecorded(mut self) -> Self {
        self.record = false;
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message_override = Some(message.into());
        self
    }
}

#[async_trait]
pub trait Agent: Send {
    /// Run one query to a final answer
    async fn invoke(&mut self, query: &str) -> Result<AgentResponse, EngineError>;

    /// Call a registered tool. Errors only when the tool does not exist or the
    /// call could not be recorded; tool failures come back as error results.
    async fn call_tool(&mut self, call: DirectToolCall) -> Result<ToolResult, EngineError>;

    fn system_prompt(&self) -> &str;

    fn set_system_prompt(&mut self, prompt: String);

    /// Conversation history, oldest first
    fn messages(&self) -> &[Message];
}
