//! Agent Core
//!
//! Each query runs through an iterative think-act-observe cycle:
//!
//! 1. Send the system prompt plus conversation history to the model
//! 2. If the model asks for a tool, run it, add the result and go again
//! 3. If the model answers, record the answer and return it
//!
//! # Limits
//!
//! - Max 20 iterations per query
//! - 300-second timeout per model call
//! - 5MB result size limit
//!
//! History survives across queries. With a session manager attached every
//! message is also written to disk, and attaching loads what was there.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Agent, AgentResponse, DirectToolCall, WorkingMemory};
use crate::llm::{LLMProvider, LLMResponse, Message};
use crate::session::{FileSessionManager, DEFAULT_AGENT_ID};
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;
use sdk::types::ToolResult;

/// Maximum number of iterations per query
pub const MAX_ITERATIONS: usize = 20;

/// Timeout for each model call in seconds
pub const LLM_TIMEOUT_SECS: u64 = 300;

/// Maximum result size in bytes (5MB)
pub const MAX_RESULT_SIZE: usize = 5 * 1024 * 1024;

pub struct AgentCore {
    provider: Box<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    memory: WorkingMemory,
    system_prompt: String,
    session: Option<Arc<FileSessionManager>>,
    max_iterations: usize,
    llm_timeout: Duration,
}

impl AgentCore {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            memory: WorkingMemory::new(),
            system_prompt: system_prompt.into(),
            session: None,
            max_iterations: MAX_ITERATIONS,
            llm_timeout: Duration::from_secs(LLM_TIMEOUT_SECS),
        }
    }

    /// Persist history through `session`, loading what it already holds.
    ///
    /// Unreadable history is logged and the conversation starts empty.
    pub fn with_session(mut self, session: Arc<FileSessionManager>) -> Self {
        match session.load_messages(DEFAULT_AGENT_ID) {
            Ok(history) => {
                if !history.is_empty() {
                    info!(
                        "Restored {} messages from session {}",
                        history.len(),
                        session.session_id()
                    );
                }
                self.memory.restore(history);
            }
            Err(e) => warn!("Could not load session history: {}", e),
        }
        self.session = Some(session);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    /// Add to history and to the session, if any
    fn record(&mut self, message: Message) {
        if let Some(session) = &self.session {
            if let Err(e) = session.append_message(DEFAULT_AGENT_ID, &message) {
                warn!("Failed to persist message to session: {}", e);
            }
        }
        self.memory.add_message(message);
    }

    fn request_messages(&self) -> Vec<Message> {
        let tools_prompt = self.tools.system_prompt();
        let system = if self.system_prompt.trim().is_empty() {
            tools_prompt
        } else {
            format!("{}\n\n{}", self.system_prompt, tools_prompt)
        };

        let mut messages = Vec::with_capacity(self.memory.messages().len() + 1);
        messages.push(Message::system(system));
        messages.extend_from_slice(self.memory.messages());
        messages
    }

    fn check_size(kind: &str, size: usize) -> Result<(), EngineError> {
        if size > MAX_RESULT_SIZE {
            warn!(
                "{} exceeds size limit: {} bytes > {} bytes",
                kind, size, MAX_RESULT_SIZE
            );
            return Err(EngineError::ResultSizeExceeded {
                size,
                limit: MAX_RESULT_SIZE,
            });
        }
        Ok(())
    }

    /// Assistant message announcing a tool call, in the format the model uses
    fn tool_call_message(name: &str, arguments: &Value) -> Message {
        Message::assistant(json!({"function": name, "arguments": arguments}).to_string())
    }
}

#[async_trait::async_trait]
impl Agent for AgentCore {
    async fn invoke(&mut self, query: &str) -> Result<AgentResponse, EngineError> {
        let start_time = Instant::now();
        info!("Starting query with {}: {}", self.provider.name(), query);

        self.record(Message::user(query));

        let mut iteration = 0;
        while iteration < self.max_iterations {
            iteration += 1;
            debug!("Iteration {}/{}", iteration, self.max_iterations);

            let messages = self.request_messages();
            let response = match timeout(self.llm_timeout, self.provider.generate(&messages)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    error!("Model call failed: {}", e);
                    return Err(EngineError::LLMProvider(e.to_string()));
                }
                Err(_) => {
                    error!("Model call timed out after {}s", self.llm_timeout.as_secs());
                    return Err(EngineError::LLMTimeout);
                }
            };

            match response {
                LLMResponse::ToolCall(tool_call) => {
                    debug!("Tool call: {} ({})", tool_call.name, tool_call.id);

                    let arguments: Value =
                        serde_json::from_str(&tool_call.arguments).unwrap_or_default();
                    self.record(Self::tool_call_message(&tool_call.name, &arguments));

                    let result = self
                        .tools
                        .dispatch_json(&tool_call.name, &tool_call.arguments)
                        .await
                        .text();
                    Self::check_size("Tool result", result.len())?;

                    self.record(Message::tool_result(result, &tool_call.id));
                }
                LLMResponse::FinalAnswer(answer) => {
                    Self::check_size("Final answer", answer.content.len())?;
                    self.record(Message::assistant(&answer.content));

                    info!(
                        "Query completed in {}ms after {} iterations",
                        start_time.elapsed().as_millis(),
                        iteration
                    );
                    return Ok(AgentResponse {
                        text: answer.content,
                        reasoning: answer.reasoning,
                        iterations: iteration,
                    });
                }
            }
        }

        error!("Query exceeded max iterations ({})", self.max_iterations);
        Err(EngineError::MaxIterationsExceeded)
    }

    async fn call_tool(&mut self, call: DirectToolCall) -> Result<ToolResult, EngineError> {
        if !self.tools.has_tool(&call.name) {
            return Err(EngineError::ToolNotFound(call.name));
        }

        let result = self
            .tools
            .dispatch(&call.name, call.arguments.clone())
            .await;

        if call.record {
            let text = result.text();
            Self::check_size("Tool result", text.len())?;

            let user_message = call.user_message_override.clone().unwrap_or_else(|| {
                format!(
                    "agent.tool.{} direct tool call.\nInput parameters: {}",
                    call.name, call.arguments
                )
            });
            let call_id = format!("direct_{}", Uuid::new_v4().simple());

            self.record(Message::user(user_message));
            self.record(Self::tool_call_message(&call.name, &call.arguments));
            self.record(Message::tool_result(text, call_id));
        }

        Ok(result)
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }

    fn messages(&self) -> &[Message] {
        self.memory.messages()
    }
}
