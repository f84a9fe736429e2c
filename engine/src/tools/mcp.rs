//! MCP client tool
//!
//! Lets the model (and the startup code) manage MCP connections:
//! `connect`, `load_tools`, `list_connections`, `disconnect`, `call_tool`.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::mcp::{McpManager, McpServerConfig, McpTransport};
use sdk::types::{ToolInput, ToolResult};

pub struct McpClientTool {
    manager: Arc<McpManager>,
}

impl McpClientTool {
    pub fn new(manager: Arc<McpManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<McpManager> {
        &self.manager
    }

    pub async fn call(&self, input: &ToolInput) -> ToolResult {
        let action = input.param_str_opt("action").unwrap_or_default();
        let connection_id = input.param_str_opt("connection_id");

        match (action.as_str(), connection_id) {
            ("list_connections", _) => self.list_connections(),
            ("connect", Some(id)) => {
                let config = match config_from_input(input) {
                    Ok(config) => config,
                    Err(msg) => return ToolResult::error(msg),
                };
                match self.manager.connect(&id, &config).await {
                    Ok(()) => ToolResult::success(format!("Connected to MCP server: {}", id)),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            ("load_tools", Some(id)) => match self.manager.load_tools(&id).await {
                Ok(tools) => {
                    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
                    ToolResult::success(format!(
                        "Loaded {} tools from {}: {}",
                        tools.len(),
                        id,
                        names.join(", ")
                    ))
                }
                Err(e) => ToolResult::error(e.to_string()),
            },
            ("disconnect", Some(id)) => match self.manager.disconnect(&id).await {
                Ok(()) => ToolResult::success(format!("Disconnected from MCP server: {}", id)),
                Err(e) => ToolResult::error(e.to_string()),
            },
            ("call_tool", _) => {
                let Some(tool_name) = input.param_str_opt("tool_name") else {
                    return ToolResult::error("tool_name is required for call_tool");
                };
                let args = input
                    .params
                    .get("tool_args")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                self.manager
                    .call_tool(&tool_name, args)
                    .await
                    .unwrap_or_else(|| {
                        ToolResult::error(format!("Tool {} is not loaded", tool_name))
                    })
            }
            ("connect" | "load_tools" | "disconnect", None) => {
                ToolResult::error(format!("connection_id is required for {}", action))
            }
            _ => ToolResult::error(format!(
                "Unknown action: {}. Use connect, load_tools, list_connections, disconnect or call_tool",
                action
            )),
        }
    }

    fn list_connections(&self) -> ToolResult {
        let connections = self.manager.list_connections();
        if connections.is_empty() {
            return ToolResult::success("No active MCP connections");
        }

        let mut lines = vec!["Active MCP connections:".to_string()];
        for conn in connections {
            lines.push(format!("  Connection: {}", conn.connection_id));
            lines.push(format!("    Transport: {}", conn.transport.as_str()));
            lines.push(format!("    Tools loaded: {}", conn.tool_count));
        }
        ToolResult::success(lines.join("\n"))
    }
}

fn config_from_input(input: &ToolInput) -> Result<McpServerConfig, String> {
    let transport = match input.param_str_opt("transport").as_deref() {
        None | Some("stdio") => McpTransport::Stdio,
        Some("sse") => McpTransport::Sse,
        Some(other) => return Err(format!("Unsupported transport: {}", other)),
    };

    let args = input
        .params
        .get("args")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let env: BTreeMap<String, String> = input
        .params
        .get("env")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(McpServerConfig {
        connection_id: input.param_str_opt("connection_id"),
        transport,
        command: input.param_str_opt("command"),
        args,
        env,
        server_url: input.param_str_opt("server_url"),
        auto_load_tools: false,
    })
}
