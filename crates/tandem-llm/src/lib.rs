//! Model-runtime client for tandem
//!
//! Provides the [`LlmClient`] trait the turn orchestrator is parameterized
//! over, its Ollama implementation, and the model tool-support lookup.

pub mod client;
pub mod models;
pub mod ollama;

// Re-export main types
pub use client::{
    ChatChunk, ChatChunkStream, ChatOptions, ChunkMessage, FunctionCall, LlmClient, ModelInfo,
    ToolCallFragment,
};
pub use models::supports_tools;
pub use ollama::OllamaClient;
