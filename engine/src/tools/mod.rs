pub mod mcp;
pub mod retrieve;
pub mod shell;
pub mod store;
pub mod welcome;

pub use mcp::McpClientTool;
pub use retrieve::RetrieveTool;
pub use shell::ShellTool;
pub use store::StoreInKbTool;
pub use welcome::WelcomeTool;

use serde_json::Value;
use tracing::{debug, warn};

use sdk::types::{ToolInput, ToolResult};

/// Registry of tools the agent can call.
///
/// Built-in tools are optional; only those that are `Some` are advertised in
/// the system prompt and dispatchable. Tools loaded from MCP connections are
/// resolved through the `mcp_client` tool's manager.
#[derive(Default)]
pub struct ToolRegistry {
    pub shell: Option<ShellTool>,
    pub retrieve: Option<RetrieveTool>,
    pub store: Option<StoreInKbTool>,
    pub welcome: Option<WelcomeTool>,
    pub mcp: Option<McpClientTool>,
}

impl ToolRegistry {
    /// Create an empty registry with no tools enabled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dispatch a tool call whose arguments arrive as a JSON string.
    pub async fn dispatch_json(&self, name: &str, arguments_json: &str) -> ToolResult {
        let args: Value = if arguments_json.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(arguments_json) {
                Ok(v) => v,
                Err(e) => {
                    return ToolResult::error(format!(
                        "ERROR: Failed to parse arguments JSON: {}",
                        e
                    ));
                }
            }
        };
        self.dispatch(name, args).await
    }

    /// Dispatch a tool call by name.
    ///
    /// Failures come back as error results so the model can see them and
    /// correct itself.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        debug!("Dispatching tool '{}' with args: {}", name, args);

        let input = match ToolInput::from_json(name, args) {
            Ok(input) => input,
            Err(e) => return ToolResult::error(format!("ERROR: {}", e)),
        };

        match name {
            "shell" => match &self.shell {
                Some(shell) => shell.call(&input).await,
                None => disabled(name),
            },
            "retrieve" => match &self.retrieve {
                Some(retrieve) => retrieve.call(&input).await,
                None => disabled(name),
            },
            "store_in_kb" => match &self.store {
                Some(store) => store.call(&input),
                None => disabled(name),
            },
            "welcome" => match &self.welcome {
                Some(welcome) => welcome.call(&input).await,
                None => disabled(name),
            },
            "mcp_client" => match &self.mcp {
                Some(mcp) => mcp.call(&input).await,
                None => disabled(name),
            },
            _ => {
                let args = Value::Object(input.params.into_iter().collect());
                if let Some(mcp) = &self.mcp {
                    if let Some(result) = mcp.manager().call_tool(name, args).await {
                        return result;
                    }
                }
                warn!("Unknown tool requested: {}", name);
                ToolResult::error(format!(
                    "ERROR: Unknown tool '{}'. Available tools: {}",
                    name,
                    self.available_tool_names().join(", ")
                ))
            }
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.available_tool_names().iter().any(|n| n == name)
    }

    /// Generate the tool section of the system prompt.
    ///
    /// Only enabled tools are included.
    pub fn system_prompt(&self) -> String {
        let mut parts = vec![
            "You can use tools to accomplish tasks.".to_string(),
            String::new(),
            "IMPORTANT RULES:".to_string(),
            "1. To call a tool, your ENTIRE response must be ONLY the JSON object, nothing else. No explanation, no markdown fences, no text before or after.".to_string(),
            "2. When you have the final answer (after receiving tool results), respond with plain text only, no JSON.".to_string(),
            "3. Never guess or hallucinate tool output. Always call the tool and wait for the real result.".to_string(),
            String::new(),
            "Tool call format (your entire response must be exactly this):".to_string(),
            r#"{"function": "tool_name", "arguments": {"arg1": "value1"}}"#.to_string(),
            String::new(),
            "Available tools:".to_string(),
        ];

        if self.shell.is_some() {
            parts.push(String::new());
            parts.push("## shell".to_string());
            parts.push(
                "Run shell commands in the current directory. Pipes and redirects work. Commands cannot read input.".to_string(),
            );
            parts.push(
                r#"Arguments: {"command": "ls -la" or ["cmd1", "cmd2"], "work_dir": "optional/dir", "timeout": 60, "ignore_errors": false}"#
                    .to_string(),
            );
        }

        if self.retrieve.is_some() {
            parts.push(String::new());
            parts.push("## retrieve".to_string());
            parts.push("Search the knowledge base for passages related to the text.".to_string());
            parts.push(
                r#"Arguments: {"text": "search text", "knowledgeBaseId": "optional", "numberOfResults": 10, "score": 0.4}"#
                    .to_string(),
            );
        }

        if self.store.is_some() {
            parts.push(String::new());
            parts.push("## store_in_kb".to_string());
            parts.push(
                "Save content to the knowledge base in the background so it can be retrieved later."
                    .to_string(),
            );
            parts.push(
                r#"Arguments: {"content": "text to store", "title": "optional", "knowledge_base_id": "optional"}"#
                    .to_string(),
            );
        }

        if self.welcome.is_some() {
            parts.push(String::new());
            parts.push("## welcome".to_string());
            parts.push("View or replace the welcome text shown when the CLI starts.".to_string());
            parts.push(r#"Arguments: {"action": "view" | "edit", "content": "new text for edit"}"#.to_string());
        }

        if let Some(mcp) = &self.mcp {
            parts.push(String::new());
            parts.push("## mcp_client".to_string());
            parts.push("Manage connections to MCP tool servers.".to_string());
            parts.push(
                r#"Arguments: {"action": "connect" | "load_tools" | "list_connections" | "disconnect" | "call_tool", "connection_id": "id", "transport": "stdio" | "sse", "command": "program", "args": [], "server_url": "http://...", "tool_name": "name", "tool_args": {}}"#
                    .to_string(),
            );

            for tool in mcp.manager().loaded_tools() {
                parts.push(String::new());
                parts.push(format!("## {}", tool.name));
                if let Some(description) = tool.description.filter(|d| !d.is_empty()) {
                    parts.push(description);
                }
                parts.push(format!("Arguments schema: {}", tool.input_schema));
            }
        }

        parts.join("\n")
    }

    /// Return the names of all currently enabled tools.
    pub fn available_tool_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.shell.is_some() {
            names.push("shell".to_string());
        }
        if self.retrieve.is_some() {
            names.push("retrieve".to_string());
        }
        if self.store.is_some() {
            names.push("store_in_kb".to_string());
        }
        if self.welcome.is_some() {
            names.push("welcome".to_string());
        }
        if let Some(mcp) = &self.mcp {
            names.push("mcp_client".to_string());
            names.extend(mcp.manager().loaded_tools().into_iter().map(|t| t.name));
        }
        names
    }
}

fn disabled(name: &str) -> ToolResult {
    ToolResult::error(format!("ERROR: {} tool is not enabled", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry {
            welcome: Some(WelcomeTool::new(dir.path())),
            ..ToolRegistry::empty()
        };
        let result = registry.dispatch("nope", json!({})).await;
        assert!(!result.is_success());
        assert!(result.text().contains("Unknown tool 'nope'"));
        assert!(result.text().contains("welcome"));
    }

    #[tokio::test]
    async fn test_disabled_tool() {
        let registry = ToolRegistry::empty();
        let result = registry.dispatch("shell", json!({"command": "echo hi"})).await;
        assert_eq!(result.text(), "ERROR: shell tool is not enabled");
    }

    #[tokio::test]
    async fn test_bad_arguments_json() {
        let registry = ToolRegistry::empty();
        let result = registry.dispatch_json("welcome", "{not json").await;
        assert!(result.text().starts_with("ERROR: Failed to parse arguments JSON"));

        let result = registry.dispatch("welcome", json!([1, 2])).await;
        assert!(!result.is_success());
    }

    #[test]
    fn test_system_prompt_lists_enabled_tools() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry {
            shell: Some(ShellTool::new(dir.path().to_path_buf())),
            welcome: Some(WelcomeTool::new(dir.path())),
            ..ToolRegistry::empty()
        };
        let prompt = registry.system_prompt();
        assert!(prompt.contains("## shell"));
        assert!(prompt.contains("## welcome"));
        assert!(!prompt.contains("## retrieve"));
        assert_eq!(registry.available_tool_names(), vec!["shell", "welcome"]);
        assert!(registry.has_tool("shell"));
        assert!(!registry.has_tool("retrieve"));
    }
}
