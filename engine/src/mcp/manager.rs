//! Registry of live MCP connections
//!
//! Connections are keyed by connection id. Tools loaded from a connection
//! stay callable through [`McpManager::call_tool`] until it is disconnected.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use super::client::{DefaultConnector, McpConnector, McpSession, McpToolInfo};
use super::config::{McpServerConfig, McpTransport};
use sdk::errors::EngineError;
use sdk::types::ToolResult;

struct Connection {
    transport: McpTransport,
    session: Arc<dyn McpSession>,
    tools: Vec<McpToolInfo>,
}

/// Summary of one live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub connection_id: String,
    pub transport: McpTransport,
    pub tool_count: usize,
}

pub struct McpManager {
    connector: Arc<dyn McpConnector>,
    connections: RwLock<BTreeMap<String, Connection>>,
}

impl McpManager {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        Self {
            connector,
            connections: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Connection>>, EngineError> {
        self.connections
            .read()
            .map_err(|_| EngineError::Mcp("connection registry poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Connection>>, EngineError> {
        self.connections
            .write()
            .map_err(|_| EngineError::Mcp("connection registry poisoned".to_string()))
    }

    pub async fn connect(
        &self,
        connection_id: &str,
        config: &McpServerConfig,
    ) -> Result<(), EngineError> {
        if self.read()?.contains_key(connection_id) {
            return Err(EngineError::Mcp(format!(
                "Connection {} already exists",
                connection_id
            )));
        }

        let session: Arc<dyn McpSession> = Arc::from(self.connector.connect(config).await?);
        let replaced = self.write()?.insert(
            connection_id.to_string(),
            Connection {
                transport: config.transport,
                session,
                tools: Vec::new(),
            },
        );
        if let Some(old) = replaced {
            old.session.close().await;
        }

        info!("Connected to MCP server {}", connection_id);
        Ok(())
    }

    /// Fetch the server's tools and make them callable
    pub async fn load_tools(&self, connection_id: &str) -> Result<Vec<McpToolInfo>, EngineError> {
        let session = self.session(connection_id)?;
        let tools = session.list_tools().await?;

        if let Some(conn) = self.write()?.get_mut(connection_id) {
            conn.tools = tools.clone();
        }
        info!("Loaded {} tools from {}", tools.len(), connection_id);
        Ok(tools)
    }

    pub async fn disconnect(&self, connection_id: &str) -> Result<(), EngineError> {
        let removed = self.write()?.remove(connection_id);
        match removed {
            Some(conn) => {
                conn.session.close().await;
                info!("Disconnected from MCP server {}", connection_id);
                Ok(())
            }
            None => Err(EngineError::Mcp(format!(
                "Connection {} not found",
                connection_id
            ))),
        }
    }

    pub fn list_connections(&self) -> Vec<ConnectionSummary> {
        match self.read() {
            Ok(connections) => connections
                .iter()
                .map(|(id, conn)| ConnectionSummary {
                    connection_id: id.clone(),
                    transport: conn.transport,
                    tool_count: conn.tools.len(),
                })
                .collect(),
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Every tool loaded so far, across connections
    pub fn loaded_tools(&self) -> Vec<McpToolInfo> {
        self.read()
            .map(|connections| {
                connections
                    .values()
                    .flat_map(|conn| conn.tools.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.owner_of(name).is_some()
    }

    /// Call a loaded tool. `None` when no connection provides `name`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Option<ToolResult> {
        let session = self.owner_of(name)?;
        Some(match session.call_tool(name, arguments).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Error calling MCP tool {}: {}", name, e)),
        })
    }

    fn owner_of(&self, name: &str) -> Option<Arc<dyn McpSession>> {
        self.read().ok().and_then(|connections| {
            connections
                .values()
                .find(|conn| conn.tools.iter().any(|t| t.name == name))
                .map(|conn| Arc::clone(&conn.session))
        })
    }

    fn session(&self, connection_id: &str) -> Result<Arc<dyn McpSession>, EngineError> {
        self.read()?
            .get(connection_id)
            .map(|conn| Arc::clone(&conn.session))
            .ok_or_else(|| EngineError::Mcp(format!("Connection {} not found", connection_id)))
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new(Arc::new(DefaultConnector))
    }
}
