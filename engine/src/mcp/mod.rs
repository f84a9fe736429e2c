//! MCP Integration
//!
//! Connections to external Model Context Protocol tool servers. Startup
//! connects every configured server through the agent's `mcp_client` tool
//! and loads its tools; interactive sessions disconnect them on exit.

pub mod client;
pub mod config;
pub mod manager;

pub use client::{DefaultConnector, McpConnector, McpSession, McpToolInfo};
pub use config::{load_config, McpServerConfig, McpTransport};
pub use manager::{ConnectionSummary, McpManager};

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{info, warn};

use crate::agent::{Agent, DirectToolCall};

const MCP_TOOL: &str = "mcp_client";

fn mcp_call(arguments: Value) -> DirectToolCall {
    DirectToolCall::new(MCP_TOOL, arguments).unrecorded()
}

fn connect_arguments(connection_id: &str, config: &McpServerConfig) -> Value {
    let mut args = Map::new();
    args.insert("action".into(), json!("connect"));
    args.insert("connection_id".into(), json!(connection_id));
    args.insert("transport".into(), json!(config.transport.as_str()));

    match config.transport {
        McpTransport::Stdio => {
            if let Some(command) = &config.command {
                args.insert("command".into(), json!(command));
            }
            args.insert("args".into(), json!(config.args));
            if !config.env.is_empty() {
                args.insert("env".into(), json!(config.env));
            }
        }
        McpTransport::Sse => {
            if let Some(url) = &config.server_url {
                args.insert("server_url".into(), json!(url));
            }
        }
    }
    Value::Object(args)
}

/// Connect every configured server, loading tools where requested.
///
/// Missing connection ids are generated and written back into `configs`.
/// Returns success per connection id; progress is printed to `out`.
pub async fn initialize_mcp_connections(
    configs: &mut [McpServerConfig],
    agent: &mut dyn Agent,
    out: &mut dyn Write,
) -> BTreeMap<String, bool> {
    let mut results = BTreeMap::new();

    for (i, config) in configs.iter_mut().enumerate() {
        if let Some(generated) = config.ensure_connection_id(i) {
            let _ = writeln!(out, "📝 Auto-generated connection_id: {}", generated);
        }
        let connection_id = config.connection_id.clone().unwrap_or_default();

        let connected = agent
            .call_tool(mcp_call(connect_arguments(&connection_id, config)))
            .await;

        match connected {
            Ok(result) if result.is_success() => {
                let _ = writeln!(out, "✓ Connected to MCP server: {}", connection_id);

                if config.auto_load_tools {
                    let loaded = agent
                        .call_tool(mcp_call(json!({
                            "action": "load_tools",
                            "connection_id": connection_id,
                        })))
                        .await;
                    match loaded {
                        Ok(r) if r.is_success() => {
                            let _ = writeln!(out, "  ✓ Loaded tools from {}", connection_id);
                        }
                        _ => {
                            let _ =
                                writeln!(out, "  ✗ Failed to load tools from {}", connection_id);
                        }
                    }
                }
                results.insert(connection_id, true);
            }
            Ok(result) => {
                let _ = writeln!(out, "✗ Failed to connect to MCP server: {}", connection_id);
                let _ = writeln!(
                    out,
                    "  Error: {}",
                    result.first_text().unwrap_or("Unknown error")
                );
                results.insert(connection_id, false);
            }
            Err(e) => {
                let _ = writeln!(
                    out,
                    "✗ Error connecting to MCP server {}: {}",
                    connection_id, e
                );
                results.insert(connection_id, false);
            }
        }
    }

    info!(
        "MCP initialization: {} of {} connections succeeded",
        results.values().filter(|ok| **ok).count(),
        results.len()
    );
    results
}

/// Ids of the currently open connections
pub async fn list_active_connections(agent: &mut dyn Agent) -> Vec<String> {
    let result = match agent
        .call_tool(mcp_call(json!({"action": "list_connections"})))
        .await
    {
        Ok(result) if result.is_success() => result,
        _ => return Vec::new(),
    };

    let text = result.text();
    if text.contains("No active MCP connections") {
        return Vec::new();
    }
    text.lines()
        .filter_map(|line| line.split_once("Connection:"))
        .map(|(_, id)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Close every open connection
pub async fn disconnect_all(agent: &mut dyn Agent, out: &mut dyn Write) {
    for connection_id in list_active_connections(agent).await {
        let result = agent
            .call_tool(mcp_call(json!({
                "action": "disconnect",
                "connection_id": connection_id,
            })))
            .await;
        match result {
            Ok(r) if r.is_success() => {
                let _ = writeln!(out, "✓ Disconnected from MCP server: {}", connection_id);
            }
            Ok(r) => {
                warn!("Disconnect from {} failed: {}", connection_id, r.text());
                let _ = writeln!(out, "✗ Error disconnecting from {}: {}", connection_id, r.text());
            }
            Err(e) => {
                let _ = writeln!(out, "✗ Error disconnecting from {}: {}", connection_id, e);
            }
        }
    }
}
