//! Tool execution against live server connections
//!
//! Failures never reach the caller as errors: every outcome, including a
//! malformed composite name or a missing connection, is folded into the
//! returned [`ToolCall`] record.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use tandem_core::{ToolCall, ToolCallRequest};

use crate::connections::ToolConnections;
use crate::schema::decode_tool_name;

/// Executes model-requested tool calls, one at a time
pub struct ToolExecutor {
    connections: Arc<dyn ToolConnections>,
}

impl ToolExecutor {
    pub fn new(connections: Arc<dyn ToolConnections>) -> Self {
        Self { connections }
    }

    /// Execute one tool call and settle it into a terminal record.
    pub async fn execute(&self, request: &ToolCallRequest) -> ToolCall {
        let started_at = Utc::now();
        let start = Instant::now();

        let (server, tool) = match decode_tool_name(&request.name) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(name = %request.name, "malformed tool name");
                return ToolCall::failed(
                    request.id.clone(),
                    String::new(),
                    request.name.clone(),
                    request.arguments.clone(),
                    e.to_string(),
                    started_at,
                );
            }
        };

        if !self.connections.has_server(server).await {
            return ToolCall::failed(
                request.id.clone(),
                server,
                tool,
                request.arguments.clone(),
                format!("No connection to server {server}"),
                started_at,
            );
        }

        info!(server = %server, tool = %tool, "executing tool");

        match self
            .connections
            .call_tool(server, tool, request.arguments.clone())
            .await
        {
            Ok(value) => {
                let result = normalize_result(value);
                info!(
                    server = %server,
                    tool = %tool,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "tool completed"
                );
                ToolCall::completed(
                    request.id.clone(),
                    server,
                    tool,
                    request.arguments.clone(),
                    result,
                    started_at,
                )
            }
            Err(e) => {
                warn!(
                    server = %server,
                    tool = %tool,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "tool failed"
                );
                ToolCall::failed(
                    request.id.clone(),
                    server,
                    tool,
                    request.arguments.clone(),
                    e.to_string(),
                    started_at,
                )
            }
        }
    }
}

/// Normalize a tool's return value to text: strings pass through, everything
/// else is serialized as JSON.
fn normalize_result(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
