//! Tool input/result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input to a tool invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub name: String,
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create a new ToolInput for the named tool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: HashMap::new(),
        }
    }

    /// Build an input from a JSON arguments object.
    ///
    /// Non-object arguments are rejected; `null` is treated as no arguments.
    pub fn from_json(name: impl Into<String>, args: serde_json::Value) -> Result<Self, ToolError> {
        let params = match args {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => HashMap::new(),
            other => {
                return Err(ToolError::InvalidParameter(format!(
                    "arguments must be a JSON object, got {}",
                    other
                )))
            }
        };
        Ok(Self {
            name: name.into(),
            params,
        })
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.param_str_opt(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Get an optional i64 parameter
    pub fn param_i64_opt(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }

    /// Get an optional f64 parameter
    pub fn param_f64_opt(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }

    /// Get an optional bool parameter
    pub fn param_bool_opt(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// Get a parameter as a JSON value
    pub fn param_json(&self, key: &str) -> Result<&serde_json::Value, ToolError> {
        self.params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }
}

/// Outcome of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// One block of tool output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultContent {
    pub text: String,
}

/// Result returned by every tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub content: Vec<ToolResultContent>,
}

impl ToolResult {
    /// Create a successful result with a single text block
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            content: vec![ToolResultContent { text: text.into() }],
        }
    }

    /// Create a successful result from several text blocks
    pub fn success_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: ToolStatus::Success,
            content: lines
                .into_iter()
                .map(|text| ToolResultContent { text: text.into() })
                .collect(),
        }
    }

    /// Create an error result
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            content: vec![ToolResultContent { text: text.into() }],
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// Text of the first content block, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| c.text.as_str())
    }

    /// All content blocks joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}
