//! Conversation list and selection
//!
//! The store owns the conversation list and is the only caller of the turn
//! orchestrator. Input validation happens here, before any state mutation;
//! the single in-flight-turn-per-conversation invariant is enforced by the
//! active-turn table.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tandem_core::{Error, Result};
use tandem_llm::LlmClient;
use tandem_tools::ToolConnections;

use crate::cancel::AbortHandle;
use crate::conversation::{Conversation, SharedConversation};
use crate::orchestrator::{ChatConfig, TurnOrchestrator, TurnOutcome};
use crate::persistence::ConversationsApi;

/// Out-of-band title update pushed by the backend
#[derive(Debug, Clone)]
pub struct TitleUpdate {
    pub session_id: String,
    pub title: String,
}

/// Holds the conversation list and routes messages into the orchestrator
pub struct ChatStore {
    conversations: RwLock<Vec<SharedConversation>>,
    selected: RwLock<Option<String>>,
    active_turns: RwLock<HashMap<String, AbortHandle>>,
    api: Arc<dyn ConversationsApi>,
    orchestrator: TurnOrchestrator,
    config: RwLock<ChatConfig>,
}

impl ChatStore {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        connections: Arc<dyn ToolConnections>,
        api: Arc<dyn ConversationsApi>,
        config: ChatConfig,
    ) -> Self {
        Self {
            conversations: RwLock::new(Vec::new()),
            selected: RwLock::new(None),
            active_turns: RwLock::new(HashMap::new()),
            api,
            orchestrator: TurnOrchestrator::new(llm, connections),
            config: RwLock::new(config),
        }
    }

    /// Load durable records and reconcile them into the in-memory model
    pub async fn init(&self) -> Result<()> {
        let records = self.api.list().await?;
        let mut conversations = self.conversations.write().await;
        conversations.clear();
        for record in records {
            conversations.push(Arc::new(RwLock::new(Conversation::from_record(record))));
        }
        info!(count = conversations.len(), "loaded conversations");
        Ok(())
    }

    /// Create a new conversation and select it
    pub async fn create_conversation(&self) -> Result<SharedConversation> {
        let record = self.api.create().await?;
        let session_id = record.session_id.clone();
        let conversation = Arc::new(RwLock::new(Conversation::from_record(record)));

        self.conversations
            .write()
            .await
            .insert(0, conversation.clone());
        *self.selected.write().await = Some(session_id.clone());
        debug!(session_id = %session_id, "created conversation");
        Ok(conversation)
    }

    /// Select a conversation by session id
    pub async fn select(&self, session_id: &str) -> Result<()> {
        if self.get(session_id).await.is_none() {
            return Err(Error::not_found(format!("conversation {session_id}")));
        }
        *self.selected.write().await = Some(session_id.to_string());
        Ok(())
    }

    /// The currently selected conversation
    pub async fn selected(&self) -> Option<SharedConversation> {
        let session_id = self.selected.read().await.clone()?;
        self.get(&session_id).await
    }

    /// Look up a conversation by session id
    pub async fn get(&self, session_id: &str) -> Option<SharedConversation> {
        let conversations = self.conversations.read().await;
        for conversation in conversations.iter() {
            if conversation.read().await.session_id == session_id {
                return Some(conversation.clone());
            }
        }
        None
    }

    /// All conversations, newest first
    pub async fn conversations(&self) -> Vec<SharedConversation> {
        self.conversations.read().await.clone()
    }

    /// Delete a conversation; removal is terminal
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let conversation = self
            .get(session_id)
            .await
            .ok_or_else(|| Error::not_found(format!("conversation {session_id}")))?;

        // Stop any in-flight turn before the conversation goes away
        if let Some(handle) = self.active_turns.write().await.remove(session_id) {
            handle.cancel();
        }

        if let Some(id) = conversation.read().await.id {
            self.api.delete(id).await?;
        }

        let mut conversations = self.conversations.write().await;
        let mut index = None;
        for (i, candidate) in conversations.iter().enumerate() {
            if candidate.read().await.session_id == session_id {
                index = Some(i);
                break;
            }
        }
        if let Some(i) = index {
            conversations.remove(i);
        }
        drop(conversations);

        let mut selected = self.selected.write().await;
        if selected.as_deref() == Some(session_id) {
            *selected = None;
        }
        info!(session_id = %session_id, "deleted conversation");
        Ok(())
    }

    /// Rename a conversation, persisting the new title
    pub async fn rename(&self, session_id: &str, title: Option<String>) -> Result<()> {
        let conversation = self
            .get(session_id)
            .await
            .ok_or_else(|| Error::not_found(format!("conversation {session_id}")))?;

        let id = conversation.read().await.id;
        if let Some(id) = id {
            self.api.rename(id, title.clone()).await?;
        }
        conversation.write().await.title = title;
        Ok(())
    }

    /// Patch a title from an out-of-band backend notification.
    ///
    /// Idempotent: re-applying the same update is a no-op.
    pub async fn apply_title_update(&self, update: TitleUpdate) {
        if let Some(conversation) = self.get(&update.session_id).await {
            let mut conversation = conversation.write().await;
            if conversation.title.as_deref() == Some(update.title.as_str()) {
                return;
            }
            debug!(session_id = %update.session_id, title = %update.title, "title updated");
            conversation.title = Some(update.title);
        }
    }

    /// Replace the chat configuration
    pub async fn set_config(&self, config: ChatConfig) {
        *self.config.write().await = config;
    }

    pub async fn config(&self) -> ChatConfig {
        self.config.read().await.clone()
    }

    /// Send a message on the selected conversation, creating one if needed.
    ///
    /// Validation failures reject the send before any turn is created.
    pub async fn send_message(
        &self,
        text: &str,
        selected_tools: Vec<String>,
    ) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let config = self.config.read().await.clone();
        if config.model.trim().is_empty() {
            return Err(Error::NoModelSelected);
        }

        let conversation = match self.selected().await {
            Some(conversation) => conversation,
            None => self.create_conversation().await?,
        };
        let session_id = conversation.read().await.session_id.clone();

        // One in-flight turn per conversation; the handle is fresh per turn
        let handle = {
            let mut active = self.active_turns.write().await;
            if active.contains_key(&session_id) {
                return Err(Error::TurnInFlight(session_id));
            }
            let handle = AbortHandle::new();
            active.insert(session_id.clone(), handle.clone());
            handle
        };

        let outcome = self
            .orchestrator
            .run(
                conversation,
                text.to_string(),
                selected_tools,
                &config,
                handle,
            )
            .await;

        // The handle is discarded, never reused
        self.active_turns.write().await.remove(&session_id);
        Ok(outcome)
    }

    /// Cancel the selected conversation's in-flight turn, if any
    pub async fn cancel(&self) -> bool {
        let Some(session_id) = self.selected.read().await.clone() else {
            return false;
        };
        self.cancel_session(&session_id).await
    }

    /// Cancel a specific conversation's in-flight turn, if any
    pub async fn cancel_session(&self, session_id: &str) -> bool {
        let active = self.active_turns.read().await;
        match active.get(session_id) {
            Some(handle) => {
                info!(session_id = %session_id, "cancelling turn");
                handle.cancel();
                true
            }
            None => false,
        }
    }
}
