//! Live tool-server connections
//!
//! The executor resolves "server name → live connection" through the
//! [`ToolConnections`] trait; [`ConnectionRegistry`] is the in-memory
//! implementation the application composes at startup.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tandem_core::{Error, Result, ToolDefinition};

use crate::schema::TOOL_NAME_SEPARATOR;

/// A live connection to one tool server
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Tools this server exposes
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Invoke a tool on this server; any rejection is a tool failure
    async fn call(&self, tool: &str, arguments: Value) -> anyhow::Result<Value>;
}

/// Shared server connection handle
pub type BoxedServer = Arc<dyn ToolServer>;

/// Resolution surface the executor and orchestrator work against
#[async_trait]
pub trait ToolConnections: Send + Sync {
    /// Invoke a tool on the named server
    async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> anyhow::Result<Value>;

    /// All tools, grouped by owning server
    async fn tools_by_server(&self) -> HashMap<String, Vec<ToolDefinition>>;

    /// Whether a live connection exists for the named server
    async fn has_server(&self, server: &str) -> bool;
}

/// In-memory registry of live server connections
pub struct ConnectionRegistry {
    servers: RwLock<HashMap<String, BoxedServer>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a server connection under a unique name.
    ///
    /// Server names join the flat tool namespace, so a duplicate name or a
    /// name containing the composite separator is rejected here, at install
    /// time, rather than surfacing later as a routing ambiguity.
    pub async fn register(&self, name: impl Into<String>, server: BoxedServer) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_argument("server name is empty"));
        }
        if name.contains(TOOL_NAME_SEPARATOR) {
            return Err(Error::invalid_argument(format!(
                "server name {name:?} contains the tool-name separator"
            )));
        }

        let mut servers = self.servers.write().await;
        if servers.contains_key(&name) {
            return Err(Error::invalid_argument(format!(
                "server {name} is already registered"
            )));
        }
        info!(server = %name, tools = server.tools().len(), "registered tool server");
        servers.insert(name, server);
        Ok(())
    }

    /// Remove a server connection
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.servers.write().await.remove(name).is_some();
        if removed {
            debug!(server = %name, "unregistered tool server");
        }
        removed
    }

    /// Names of all registered servers
    pub async fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolConnections for ConnectionRegistry {
    async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> anyhow::Result<Value> {
        let connection = {
            let servers = self.servers.read().await;
            servers
                .get(server)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no connection to server {server}"))?
        };
        connection.call(tool, arguments).await
    }

    async fn tools_by_server(&self) -> HashMap<String, Vec<ToolDefinition>> {
        let servers = self.servers.read().await;
        servers
            .iter()
            .map(|(name, server)| (name.clone(), server.tools()))
            .collect()
    }

    async fn has_server(&self, server: &str) -> bool {
        self.servers.read().await.contains_key(server)
    }
}
