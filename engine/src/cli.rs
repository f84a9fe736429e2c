//! CLI interface for Strands
//!
//! This module provides the command-line interface using clap's derive API.
//! Positional words form a one-shot query; without them the interactive loop
//! runs. Values that also have an environment fallback are resolved later in
//! `config::Settings` so the precedence rules live in one place.

use clap::Parser;
use std::path::PathBuf;

/// Strands - A minimal CLI interface for Strands
///
/// Runs an agent with shell, knowledge-base and MCP tools, either for a
/// single query or as an interactive session.
#[derive(Parser, Debug, Clone)]
#[command(name = "strands")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Query to process (omit for interactive mode)
    pub query: Vec<String>,

    /// Knowledge base ID to use for retrievals and storage
    #[arg(long = "kb", alias = "knowledge-base", value_name = "ID")]
    pub knowledge_base_id: Option<String>,

    /// Model provider to use for inference (name or path to a provider file)
    #[arg(long, default_value = "bedrock", value_name = "NAME_OR_PATH")]
    pub model_provider: String,

    /// Model config as JSON string or path to a .json file
    #[arg(long, default_value = "{}", value_name = "JSON_OR_PATH")]
    pub model_config: String,

    /// Session ID to resume or create
    #[arg(long, value_name = "ID")]
    pub session_id: Option<String>,

    /// Directory where sessions are stored
    #[arg(long, value_name = "DIR")]
    pub session_path: Option<PathBuf>,

    /// List available sessions and exit
    #[arg(long)]
    pub list_sessions: bool,

    /// MCP server connections as JSON string or path to a .json file
    #[arg(long, value_name = "JSON_OR_PATH")]
    pub mcp_config: Option<String>,

    /// Set the logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to log file. If not specified, logs to stderr when log-level is set
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// The one-shot query, if positional words were given
    pub fn joined_query(&self) -> Option<String> {
        if self.query.is_empty() {
            None
        } else {
            Some(self.query.join(" "))
        }
    }
}
