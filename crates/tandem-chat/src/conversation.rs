//! Conversation and turn model
//!
//! A conversation holds an ordered sequence of turns. Each role carries only
//! the fields it needs; the assistant variant owns the streaming flags and
//! tool-call records mutated by the orchestrator while a turn is in flight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use tandem_core::{ChatMessage, ChatRole, ToolCall, ToolCallRequest};
use tandem_tools::encode_tool_name;

use crate::persistence::ConversationRecord;

/// Conversation shared between the store, the orchestrator, and observers
pub type SharedConversation = Arc<RwLock<Conversation>>;

/// A conversation with its message history
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    /// Durable id assigned by the persistence API
    pub id: Option<i64>,
    /// Client-local session id
    pub session_id: String,
    pub title: Option<String>,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new, unpersisted conversation
    pub fn new() -> Self {
        Self {
            id: None,
            session_id: Uuid::new_v4().to_string(),
            title: None,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Reconcile a durable record into the in-memory model
    pub fn from_record(record: ConversationRecord) -> Self {
        Self {
            id: Some(record.id),
            session_id: record.session_id,
            title: record.title,
            turns: Vec::new(),
            created_at: record.created_at,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Whether any turn is currently streaming
    pub fn is_streaming(&self) -> bool {
        self.turns.iter().any(|t| t.is_streaming())
    }

    /// The in-flight assistant turn, if one exists
    pub fn streaming_assistant_mut(&mut self) -> Option<&mut AssistantTurn> {
        self.turns.iter_mut().rev().find_map(|turn| match turn {
            Turn::Assistant(t) if t.is_streaming => Some(t),
            _ => None,
        })
    }

    /// The most recent assistant turn
    pub fn last_assistant(&self) -> Option<&AssistantTurn> {
        self.turns.iter().rev().find_map(|turn| match turn {
            Turn::Assistant(t) => Some(t),
            _ => None,
        })
    }

    /// Render settled turns as wire messages for the model runtime.
    ///
    /// The in-flight placeholder contributes nothing. An assistant turn that
    /// made tool calls expands into its tool-call message followed by one
    /// tool-result message per call, preserving request order.
    pub fn history(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        for turn in &self.turns {
            match turn {
                Turn::User(t) => messages.push(ChatMessage::user(&t.content)),
                Turn::System(t) => messages.push(ChatMessage::system(&t.content)),
                Turn::Tool(t) => {
                    messages.push(ChatMessage::tool_result(&t.tool_call_id, &t.content));
                }
                Turn::Assistant(t) => {
                    if t.is_streaming {
                        continue;
                    }
                    if t.tool_calls.is_empty() {
                        messages.push(ChatMessage::assistant(&t.content));
                    } else {
                        let requests = t
                            .tool_calls
                            .iter()
                            .map(|call| ToolCallRequest {
                                id: call.id.clone(),
                                name: encode_tool_name(&call.server, &call.tool),
                                arguments: call.arguments.clone(),
                            })
                            .collect();
                        messages.push(ChatMessage::assistant_with_tool_calls(
                            &t.content, requests,
                        ));
                        for call in &t.tool_calls {
                            messages.push(ChatMessage::tool_result(
                                &call.id,
                                result_text(call),
                            ));
                        }
                    }
                }
            }
        }
        messages
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool-result text for history: the result on success, the error otherwise
fn result_text(call: &ToolCall) -> String {
    match (&call.result, &call.error) {
        (Some(result), _) => result.clone(),
        (None, Some(error)) => format!("Error: {error}"),
        (None, None) => String::new(),
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User(UserTurn),
    Assistant(AssistantTurn),
    System(SystemTurn),
    Tool(ToolResultTurn),
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User(UserTurn {
            content: content.into(),
            created_at: Utc::now(),
        })
    }

    pub fn system(content: impl Into<String>) -> Self {
        Turn::System(SystemTurn {
            content: content.into(),
            created_at: Utc::now(),
        })
    }

    pub fn role(&self) -> ChatRole {
        match self {
            Turn::User(_) => ChatRole::User,
            Turn::Assistant(_) => ChatRole::Assistant,
            Turn::System(_) => ChatRole::System,
            Turn::Tool(_) => ChatRole::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::User(t) => &t.content,
            Turn::Assistant(t) => &t.content,
            Turn::System(t) => &t.content,
            Turn::Tool(t) => &t.content,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Turn::Assistant(t) if t.is_streaming)
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Turn::Assistant(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTurn {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemTurn {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A tool-result message reconciled from persistence
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultTurn {
    pub content: String,
    pub tool_call_id: String,
    pub created_at: DateTime<Utc>,
}

/// Assistant turn: the unit of streaming and settlement
#[derive(Debug, Clone, Serialize)]
pub struct AssistantTurn {
    pub content: String,
    /// Model's private reasoning, kept separate from `content`
    pub thinking: String,
    pub is_streaming: bool,
    pub is_thinking_streaming: bool,
    pub is_tool_executing: bool,
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

impl AssistantTurn {
    /// Placeholder for a turn that is about to stream
    pub fn streaming() -> Self {
        Self {
            content: String::new(),
            thinking: String::new(),
            is_streaming: true,
            is_thinking_streaming: false,
            is_tool_executing: false,
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Clear every streaming flag; the turn is immutable afterwards.
    pub fn settle(&mut self) {
        self.is_streaming = false;
        self.is_thinking_streaming = false;
        self.is_tool_executing = false;
    }
}
