//! Conversation store behavior over the persistence boundary

mod common;

use common::*;
use std::sync::Arc;

use tandem_chat::{ChatConfig, ChatStore, ConversationsApi, InMemoryApi, TitleUpdate};

fn empty_store(api: Arc<InMemoryApi>) -> ChatStore {
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let connections = Arc::new(MockConnections::new());
    ChatStore::new(llm, connections, api, ChatConfig::default())
}

#[tokio::test]
async fn test_create_selects_new_conversation() {
    let store = empty_store(Arc::new(InMemoryApi::new()));

    let conversation = store.create_conversation().await.unwrap();
    let session_id = conversation.read().await.session_id.clone();

    let selected = store.selected().await.unwrap();
    assert_eq!(selected.read().await.session_id, session_id);
    assert!(conversation.read().await.id.is_some());
}

#[tokio::test]
async fn test_init_reconciles_durable_records() {
    let api = Arc::new(InMemoryApi::new());
    let first = api.create().await.unwrap();
    api.rename(first.id, Some("Planning".to_string()))
        .await
        .unwrap();
    api.create().await.unwrap();

    let store = empty_store(api);
    store.init().await.unwrap();

    let conversations = store.conversations().await;
    assert_eq!(conversations.len(), 2);

    let reconciled = store.get(&first.session_id).await.unwrap();
    let reconciled = reconciled.read().await;
    assert_eq!(reconciled.id, Some(first.id));
    assert_eq!(reconciled.title.as_deref(), Some("Planning"));
    assert!(reconciled.turns.is_empty());
}

#[tokio::test]
async fn test_delete_is_terminal_and_clears_selection() {
    let api = Arc::new(InMemoryApi::new());
    let store = empty_store(api.clone());

    let conversation = store.create_conversation().await.unwrap();
    let session_id = conversation.read().await.session_id.clone();

    store.delete(&session_id).await.unwrap();
    assert!(store.get(&session_id).await.is_none());
    assert!(store.selected().await.is_none());
    assert!(api.list().await.unwrap().is_empty());

    // deleting again is an error, not a silent no-op
    assert!(store.delete(&session_id).await.is_err());
}

#[tokio::test]
async fn test_rename_persists() {
    let api = Arc::new(InMemoryApi::new());
    let store = empty_store(api.clone());

    let conversation = store.create_conversation().await.unwrap();
    let session_id = conversation.read().await.session_id.clone();

    store
        .rename(&session_id, Some("Standup notes".to_string()))
        .await
        .unwrap();
    assert_eq!(
        conversation.read().await.title.as_deref(),
        Some("Standup notes")
    );

    // the title survives a reload from the persistence API
    store.init().await.unwrap();
    let reloaded = store.get(&session_id).await.unwrap();
    assert_eq!(
        reloaded.read().await.title.as_deref(),
        Some("Standup notes")
    );
}

#[tokio::test]
async fn test_title_update_is_idempotent() {
    let store = empty_store(Arc::new(InMemoryApi::new()));
    let conversation = store.create_conversation().await.unwrap();
    let session_id = conversation.read().await.session_id.clone();

    let update = TitleUpdate {
        session_id: session_id.clone(),
        title: "Quarterly report".to_string(),
    };
    store.apply_title_update(update.clone()).await;
    store.apply_title_update(update).await;

    assert_eq!(
        conversation.read().await.title.as_deref(),
        Some("Quarterly report")
    );

    // updates for unknown conversations are dropped
    store
        .apply_title_update(TitleUpdate {
            session_id: "missing".to_string(),
            title: "nope".to_string(),
        })
        .await;
}

#[tokio::test]
async fn test_cancel_without_in_flight_turn() {
    let store = empty_store(Arc::new(InMemoryApi::new()));
    assert!(!store.cancel().await);

    store.create_conversation().await.unwrap();
    assert!(!store.cancel().await);
}
