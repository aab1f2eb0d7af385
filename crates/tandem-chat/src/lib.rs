//! tandem-chat: chat orchestration core
//!
//! Owns the per-conversation streaming state machine: response accumulation,
//! thinking/response splitting, tool-call dispatch, cancellation, and final
//! turn settlement. The model runtime and tool servers are reached through
//! the boundary traits in `tandem-llm` and `tandem-tools`; the host composes
//! the services at startup.

pub mod cancel;
pub mod conversation;
pub mod orchestrator;
pub mod persistence;
pub mod store;
pub mod thinking;

// Re-export main types
pub use cancel::{append_cancellation_marker, AbortHandle, CANCELLATION_MARKER};
pub use conversation::{AssistantTurn, Conversation, SharedConversation, Turn};
pub use orchestrator::{ChatConfig, TurnOrchestrator, TurnOutcome};
pub use persistence::{ConversationRecord, ConversationsApi, InMemoryApi};
pub use store::{ChatStore, TitleUpdate};
pub use thinking::{split_thinking, ThinkingSplit};
