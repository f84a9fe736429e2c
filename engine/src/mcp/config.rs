//! MCP connection descriptors
//!
//! Accepts either a list of descriptors, a single descriptor, or the
//! `{"mcpServers": {...}}` layout used by other MCP clients.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use sdk::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    #[default]
    Stdio,
    Sse,
}

impl McpTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
        }
    }
}

/// One external tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    #[serde(default)]
    pub transport: McpTransport,

    /// Program to launch (stdio)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Endpoint (sse)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    #[serde(default = "default_auto_load_tools")]
    pub auto_load_tools: bool,
}

fn default_auto_load_tools() -> bool {
    true
}

impl McpServerConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            connection_id: None,
            transport: McpTransport::Stdio,
            command: Some(command.into()),
            args,
            env: BTreeMap::new(),
            server_url: None,
            auto_load_tools: true,
        }
    }

    pub fn sse(server_url: impl Into<String>) -> Self {
        Self {
            transport: McpTransport::Sse,
            command: None,
            server_url: Some(server_url.into()),
            ..Self::stdio("", Vec::new())
        }
    }

    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Id derived from the transport target and the position in the list
    pub fn generated_connection_id(&self, index: usize) -> String {
        match self.transport {
            McpTransport::Stdio => {
                let command = self.command.as_deref().unwrap_or("unknown");
                let base = Path::new(command)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("mcp_{}_{}", base.replace('.', "_"), index)
            }
            McpTransport::Sse => {
                let url = self.server_url.as_deref().unwrap_or_default();
                match Url::parse(url) {
                    Ok(parsed) => {
                        let host = parsed
                            .host_str()
                            .filter(|h| !h.is_empty())
                            .unwrap_or("server")
                            .replace(['.', '-'], "_");
                        format!("mcp_{}_{}", host, index)
                    }
                    Err(_) => format!("mcp_sse_{}", index),
                }
            }
        }
    }

    /// Fill in a missing connection id. Returns the id when one was generated.
    pub fn ensure_connection_id(&mut self, index: usize) -> Option<String> {
        if self
            .connection_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
        {
            return None;
        }
        let id = self.generated_connection_id(index);
        self.connection_id = Some(id.clone());
        Some(id)
    }
}

/// Parse the `--mcp-config` value.
///
/// `raw` may be inline JSON or a path ending in `.json`. An empty value or
/// `[]` falls back to `default_path` when that file exists.
pub fn load_config(
    raw: Option<&str>,
    default_path: Option<&Path>,
) -> Result<Vec<McpServerConfig>, EngineError> {
    let raw = raw.map(str::trim).unwrap_or_default();

    let data: Value = if raw.is_empty() || raw == "[]" {
        match default_path.filter(|p| p.exists()) {
            Some(path) => read_json_file(path)?,
            None => return Ok(Vec::new()),
        }
    } else if raw.ends_with(".json") {
        read_json_file(Path::new(raw))?
    } else {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("invalid MCP config JSON: {}", e)))?
    };

    parse_servers(data)
}

fn read_json_file(path: &Path) -> Result<Value, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("failed to read MCP config {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        EngineError::Config(format!("invalid MCP config {}: {}", path.display(), e))
    })
}

fn parse_servers(data: Value) -> Result<Vec<McpServerConfig>, EngineError> {
    let items = match data {
        Value::Object(mut map) if map.contains_key("mcpServers") => {
            let servers = map.remove("mcpServers").unwrap_or(Value::Null);
            return convert_mcp_servers(servers);
        }
        Value::Object(_) => vec![data],
        Value::Array(items) => items,
        other => {
            return Err(EngineError::Config(format!(
                "MCP config must be a list or an object, got {}",
                other
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| EngineError::Config(format!("invalid MCP server entry: {}", e)))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct McpServersEntry {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    disabled: bool,
}

fn convert_mcp_servers(servers: Value) -> Result<Vec<McpServerConfig>, EngineError> {
    let servers: BTreeMap<String, McpServersEntry> = serde_json::from_value(servers)
        .map_err(|e| EngineError::Config(format!("invalid mcpServers section: {}", e)))?;

    Ok(servers
        .into_iter()
        .filter(|(_, entry)| !entry.disabled)
        .map(|(id, entry)| McpServerConfig {
            connection_id: Some(id),
            transport: McpTransport::Stdio,
            command: entry.command,
            args: entry.args,
            env: entry.env,
            server_url: None,
            auto_load_tools: true,
        })
        .collect())
}
