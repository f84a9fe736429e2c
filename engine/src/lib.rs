//! Strands Engine Library
//!
//! Core of the `strands` agent-builder CLI. It is used by both the main
//! binary and integration tests.

/// CLI interface module
pub mod cli;

/// Configuration resolution module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Session persistence and lifecycle
pub mod session;

/// Knowledge base client and background persistence
pub mod knowledge;

/// LLM provider abstraction layer
pub mod llm;

/// Agent loop core module
pub mod agent;

/// Built-in tools
pub mod tools;

/// MCP server connections
pub mod mcp;

/// Interactive command loop
pub mod repl;

/// Command handlers module
pub mod handlers;
