//! MCP client
//!
//! JSON-RPC 2.0 client for the Model Context Protocol. The protocol runs
//! over either a child process (newline-delimited messages on stdin/stdout)
//! or HTTP (one POST per message, JSON or event-stream replies).
//!
//! Session flow:
//!   1. `initialize` -> server capabilities
//!   2. `notifications/initialized`
//!   3. `tools/list`
//!   4. `tools/call`

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::{McpServerConfig, McpTransport};
use sdk::errors::EngineError;
use sdk::types::{ToolResult, ToolResultContent, ToolStatus};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SESSION_HEADER: &str = "mcp-session-id";

/// Tool advertised by a server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object"})
}

/// A live connection to one server
#[async_trait]
pub trait McpSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, EngineError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, EngineError>;

    async fn close(&self);
}

/// Opens sessions from connection descriptors
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn McpSession>, EngineError>;
}

/// Connector that launches processes and talks HTTP
#[derive(Debug, Default, Clone)]
pub struct DefaultConnector;

#[async_trait]
impl McpConnector for DefaultConnector {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn McpSession>, EngineError> {
        match config.transport {
            McpTransport::Stdio => {
                let transport = StdioTransport::spawn(config)?;
                Ok(Box::new(McpClient::initialize(transport).await?))
            }
            McpTransport::Sse => {
                let url = config.server_url.as_deref().ok_or_else(|| {
                    EngineError::Mcp("server_url is required for sse transport".to_string())
                })?;
                let transport = HttpTransport::new(url)?;
                Ok(Box::new(McpClient::initialize(transport).await?))
            }
        }
    }
}

/// Moves JSON-RPC messages to a server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response carrying the same id
    async fn request(&self, message: Value, id: u64) -> Result<Value, EngineError>;

    async fn notify(&self, message: Value) -> Result<(), EngineError>;

    async fn shutdown(&self);
}

/// Protocol layer over any transport
pub struct McpClient<T> {
    transport: T,
    next_id: AtomicU64,
    server_name: Option<String>,
}

impl<T: Transport> McpClient<T> {
    /// Run the initialize handshake
    pub async fn initialize(transport: T) -> Result<Self, EngineError> {
        let mut client = Self {
            transport,
            next_id: AtomicU64::new(1),
            server_name: None,
        };

        let result = client
            .call(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "strands",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        client.server_name = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .map(String::from);

        client
            .transport
            .notify(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        debug!(
            "MCP session initialized with {}",
            client.server_name.as_deref().unwrap_or("unnamed server")
        );
        Ok(client)
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self.transport.request(message, id).await?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(EngineError::Mcp(format!("{} failed: {}", method, message)));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl<T: Transport> McpSession for McpClient<T> {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, EngineError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({"cursor": c}),
                None => json!({}),
            };
            let result = self.call("tools/list", params).await?;
            let page: Vec<McpToolInfo> = result
                .get("tools")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| EngineError::Mcp(format!("invalid tools/list result: {}", e)))?
                .unwrap_or_default();
            tools.extend(page);

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(String::from);
            if cursor.is_none() {
                break;
            }
        }
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, EngineError> {
        let result = self
            .call("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(tool_result_from_mcp(&result))
    }

    async fn close(&self) {
        self.transport.shutdown().await;
    }
}

/// Convert a `tools/call` result into a tool result
pub fn tool_result_from_mcp(result: &Value) -> ToolResult {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let content = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let text = match item.get("type").and_then(Value::as_str) {
                        Some("text") | None => item
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        Some(other) => format!("[{} content]", other),
                    };
                    ToolResultContent { text }
                })
                .collect()
        })
        .unwrap_or_default();

    ToolResult {
        status: if is_error {
            ToolStatus::Error
        } else {
            ToolStatus::Success
        },
        content,
    }
}

struct StdioPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Child process speaking newline-delimited JSON-RPC
pub struct StdioTransport {
    child: Mutex<Child>,
    pipes: Mutex<StdioPipes>,
}

impl StdioTransport {
    pub fn spawn(config: &McpServerConfig) -> Result<Self, EngineError> {
        let command = config
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Mcp("command is required for stdio transport".to_string())
            })?;

        let mut child = Command::new(command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Mcp(format!("failed to start {}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Mcp("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Mcp("child stdout unavailable".to_string()))?;

        Ok(Self {
            child: Mutex::new(child),
            pipes: Mutex::new(StdioPipes {
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    async fn write_line(pipes: &mut StdioPipes, message: &Value) -> Result<(), EngineError> {
        let mut line = message.to_string();
        line.push('\n');
        pipes
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EngineError::Mcp(format!("write to server failed: {}", e)))?;
        pipes
            .stdin
            .flush()
            .await
            .map_err(|e| EngineError::Mcp(format!("write to server failed: {}", e)))
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, message: Value, id: u64) -> Result<Value, EngineError> {
        let mut pipes = self.pipes.lock().await;
        Self::write_line(&mut pipes, &message).await?;

        let read = async {
            let mut line = String::new();
            loop {
                line.clear();
                let n = pipes
                    .stdout
                    .read_line(&mut line)
                    .await
                    .map_err(|e| EngineError::Mcp(format!("read from server failed: {}", e)))?;
                if n == 0 {
                    return Err(EngineError::Mcp("server closed the connection".to_string()));
                }
                let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
                    debug!("Ignoring non-JSON line from MCP server");
                    continue;
                };
                if is_response_to(&value, id) {
                    return Ok(value);
                }
            }
        };

        tokio::time::timeout(REQUEST_TIMEOUT, read)
            .await
            .map_err(|_| EngineError::Mcp("server did not respond in time".to_string()))?
    }

    async fn notify(&self, message: Value) -> Result<(), EngineError> {
        let mut pipes = self.pipes.lock().await;
        Self::write_line(&mut pipes, &message).await
    }

    async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!("MCP server process already gone: {}", e);
        }
    }
}

/// HTTP endpoint speaking JSON-RPC
pub struct HttpTransport {
    url: reqwest::Url,
    client: reqwest::Client,
    session_id: std::sync::Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, EngineError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| EngineError::Mcp(format!("invalid server_url {}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(Self {
            url,
            client,
            session_id: std::sync::Mutex::new(None),
        })
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    async fn post(&self, message: &Value) -> Result<reqwest::Response, EngineError> {
        let mut builder = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = self.current_session() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.lock() {
                *slot = Some(session.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Mcp(format!(
                "server returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, message: Value, id: u64) -> Result<Value, EngineError> {
        let response = self.post(&message).await?;
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        if is_stream {
            parse_event_stream(&body, id).ok_or_else(|| {
                EngineError::Mcp(format!("no response for request {} in event stream", id))
            })
        } else {
            serde_json::from_str(&body)
                .map_err(|e| EngineError::Mcp(format!("invalid JSON-RPC response: {}", e)))
        }
    }

    async fn notify(&self, message: Value) -> Result<(), EngineError> {
        self.post(&message).await.map(|_| ())
    }

    async fn shutdown(&self) {
        let Some(session) = self.current_session() else {
            return;
        };
        let result = self
            .client
            .delete(self.url.clone())
            .header(SESSION_HEADER, session)
            .send()
            .await;
        if let Err(e) = result {
            warn!("Failed to end MCP HTTP session: {}", e);
        }
    }
}

/// A reply to request `id`. Server-initiated requests reuse ids and carry a `method`.
pub fn is_response_to(message: &Value, id: u64) -> bool {
    message.get("id").and_then(Value::as_u64) == Some(id) && message.get("method").is_none()
}

/// Find the JSON-RPC reply to `id` among `data:` lines of an event stream
pub fn parse_event_stream(body: &str, id: u64) -> Option<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|value| is_response_to(value, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Answers requests from a canned table keyed by method
    struct ScriptedTransport {
        sent: StdMutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request(&self, message: Value, id: u64) -> Result<Value, EngineError> {
            self.sent.lock().unwrap().push(message.clone());
            let result = match message["method"].as_str() {
                Some("initialize") => json!({"serverInfo": {"name": "fake"}}),
                Some("tools/list") => json!({"tools": [
                    {"name": "echo", "description": "Echo text", "inputSchema": {"type": "object"}}
                ]}),
                Some("tools/call") => json!({
                    "content": [{"type": "text", "text": message["params"]["arguments"]["text"]}]
                }),
                _ => {
                    return Ok(json!({"jsonrpc": "2.0", "id": id, "error": {"message": "nope"}}))
                }
            };
            Ok(json!({"jsonrpc": "2.0", "id": id, "result": result}))
        }

        async fn notify(&self, message: Value) -> Result<(), EngineError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    #[tokio::test]
    async fn test_handshake_and_calls() {
        let client = McpClient::initialize(ScriptedTransport::new()).await.unwrap();
        assert_eq!(client.server_name(), Some("fake"));

        {
            let sent = client.transport.sent.lock().unwrap();
            assert_eq!(sent[0]["params"]["protocolVersion"], PROTOCOL_VERSION);
            assert_eq!(sent[1]["method"], "notifications/initialized");
        }

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");

        let result = client
            .call_tool("echo", json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.text(), "hi");
    }

    #[tokio::test]
    async fn test_rpc_error_is_reported() {
        let client = McpClient::initialize(ScriptedTransport::new()).await.unwrap();
        let err = client.call("resources/list", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_tool_result_from_mcp() {
        let result = tool_result_from_mcp(&json!({
            "content": [{"type": "text", "text": "a"}, {"type": "image", "data": "..."}],
            "isError": true
        }));
        assert!(!result.is_success());
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.content[1].text, "[image content]");
    }

    #[test]
    fn test_parse_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"log\"}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{}}\n\n";
        let value = parse_event_stream(body, 3).unwrap();
        assert_eq!(value["id"], 3);
        assert!(parse_event_stream(body, 4).is_none());
    }

    #[test]
    fn test_server_request_with_same_id_is_not_a_reply() {
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let reply = json!({"jsonrpc": "2.0", "id": 1, "result": {}});
        assert!(!is_response_to(&ping, 1));
        assert!(is_response_to(&reply, 1));
        assert!(!is_response_to(&reply, 2));

        let body = format!("data: {}\n\ndata: {}\n\n", ping, reply);
        assert_eq!(parse_event_stream(&body, 1), Some(reply));
    }

    #[tokio::test]
    async fn test_stdio_requires_command() {
        let config = McpServerConfig {
            command: None,
            ..McpServerConfig::stdio("", Vec::new())
        };
        assert!(StdioTransport::spawn(&config).is_err());
    }
}
