//! Common types used across tandem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
            ChatRole::System => write!(f, "system"),
            ChatRole::Tool => write!(f, "tool"),
        }
    }
}

/// Wire-level chat message sent to the model runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message that carries the tool calls the model requested
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Tool call requested by the model, accumulated from stream fragments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    /// Composite `server_tool` name from the flat function-calling namespace
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool definition exposed by a connected tool server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Owning server connection
    pub server: String,
    /// Tool name, unique within its server only
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Lifecycle of a tool call within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Error,
}

/// Record of one tool call made during a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub server: String,
    pub tool: String,
    pub arguments: serde_json::Value,
    /// Normalized result text, present only on success
    #[serde(default)]
    pub result: Option<String>,
    /// Failure message, present only on error
    #[serde(default)]
    pub error: Option<String>,
    pub status: ToolCallStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn completed(
        id: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
        arguments: serde_json::Value,
        result: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            server: server.into(),
            tool: tool.into(),
            arguments,
            result: Some(result.into()),
            error: None,
            status: ToolCallStatus::Completed,
            started_at,
            finished_at: Some(Utc::now()),
        }
    }

    pub fn failed(
        id: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
        arguments: serde_json::Value,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            server: server.into(),
            tool: tool.into(),
            arguments,
            result: None,
            error: Some(error.into()),
            status: ToolCallStatus::Error,
            started_at,
            finished_at: Some(Utc::now()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ToolCallStatus::Completed
    }
}
