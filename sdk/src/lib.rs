//! Strands SDK
//!
//! Shared types for the Strands CLI: the error taxonomy used across the
//! engine and the tool input/result shapes exchanged between the agent and
//! its tools.

/// Error types and handling
pub mod errors;

/// Tool input/output types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, StrandsErrorExt};
pub use types::{ToolError, ToolInput, ToolResult, ToolResultContent, ToolStatus};
