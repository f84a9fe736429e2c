//! Error types and handling
//!
//! This module provides the error types used throughout the Strands CLI.
//! All errors implement the `StrandsErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! Recoverability follows the CLI's error policy: configuration problems stop
//! the process at startup, everything that happens once the interactive loop
//! is running is reported and the loop continues.

use thiserror::Error;

/// Trait for Strands error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait StrandsErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// credentials or request payloads.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are reported and the current operation is skipped.
    /// Non-recoverable errors terminate startup.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: bad JSON, unknown model provider, invalid log level
/// - **Session**: invalid session id or path, unreadable session directory
/// - **Knowledge base**: validation and remote store failures
/// - **LLM Provider**: model invocation failures
/// - **Tools / MCP**: tool dispatch and tool-server failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, StrandsErrorExt};
///
/// let error = EngineError::Session("invalid session id".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("unknown log level".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Session errors
    #[error("Session error: {0}")]
    Session(String),

    // Knowledge base errors
    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Agent loop errors
    #[error("Max iterations exceeded")]
    MaxIterationsExceeded,

    #[error("LLM call timed out")]
    LLMTimeout,

    #[error("Result size exceeded: {size} bytes > {limit} bytes")]
    ResultSizeExceeded { size: usize, limit: usize },

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // MCP errors
    #[error("MCP error: {0}")]
    Mcp(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrandsErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your command-line flags and environment variables",
            Self::Session(_) => "Session management is unavailable. Check --session-path",
            Self::KnowledgeBase(_) => {
                "Knowledge base operation failed. Check the knowledge base ID and credentials"
            }
            Self::LLMProvider(_) => "Model provider unavailable. Check your credentials and network",
            Self::MaxIterationsExceeded => "Task too complex. Try breaking it into smaller steps",
            Self::LLMTimeout => "Model provider took too long to respond. Try again",
            Self::ResultSizeExceeded { .. } => "Result too large. Try a more specific query",
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",
            Self::Mcp(_) => "MCP server unavailable. Check --mcp-config",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        let err = EngineError::Config("bad json".to_string());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bad json"));
    }

    #[test]
    fn test_runtime_errors_are_recoverable() {
        let errors = vec![
            EngineError::Session("x".to_string()),
            EngineError::KnowledgeBase("x".to_string()),
            EngineError::LLMTimeout,
            EngineError::ToolNotFound("shell".to_string()),
            EngineError::Mcp("x".to_string()),
        ];
        for err in errors {
            assert!(err.is_recoverable(), "{} should be recoverable", err);
            assert!(!err.user_hint().is_empty());
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert_eq!(err.user_hint(), "File system operation failed");
    }
}
