//! Client-side abstraction over the streaming chat runtime
//!
//! The orchestrator consumes the runtime through [`LlmClient`] so the state
//! machine is independent of which backend hosts it. Chunks arrive on a
//! bounded channel; `done=true` is the authoritative end-of-stream signal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tandem_core::{ChatMessage, Result};

/// One parsed chunk of a streaming chat response.
///
/// `content` and `tool_calls` may arrive on different chunks; some runtimes
/// deliver tool calls incrementally rather than atomically at the end.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
}

/// Message payload carried by a stream chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallFragment>,
}

/// Tool call as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Sampling options forwarded to the runtime
#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.6),
            top_p: Some(0.95),
            num_predict: Some(32768),
        }
    }
}

/// Model information from the runtime's local registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Receiver side of a streaming chat call
pub type ChatChunkStream = mpsc::Receiver<Result<ChatChunk>>;

/// Streaming chat runtime client
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Open a streaming chat call.
    ///
    /// `tools` is the flat function-calling schema, already rendered to the
    /// runtime's JSON shape; empty means no tools are offered. The `cancel`
    /// token is consumed by the network layer: once cancelled, no further
    /// chunks are delivered.
    async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatChunkStream>;

    /// List models available on the runtime
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
