//! Durable conversation records
//!
//! The store persists conversation identity and titles through this boundary;
//! message content stays client-side. [`InMemoryApi`] backs tests and the
//! development binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub session_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// CRUD boundary over durable conversation records
#[async_trait]
pub trait ConversationsApi: Send + Sync {
    async fn create(&self) -> anyhow::Result<ConversationRecord>;

    /// All records, newest first
    async fn list(&self) -> anyhow::Result<Vec<ConversationRecord>>;

    async fn delete(&self, id: i64) -> anyhow::Result<()>;

    async fn rename(&self, id: i64, title: Option<String>) -> anyhow::Result<ConversationRecord>;
}

/// In-memory implementation of the persistence boundary
pub struct InMemoryApi {
    records: Mutex<Vec<ConversationRecord>>,
    next_id: AtomicI64,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationsApi for InMemoryApi {
    async fn create(&self) -> anyhow::Result<ConversationRecord> {
        let record = ConversationRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            session_id: Uuid::new_v4().to_string(),
            title: None,
            created_at: Utc::now(),
        };
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> anyhow::Result<Vec<ConversationRecord>> {
        let mut records = self.records.lock().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            anyhow::bail!("conversation {id} not found");
        }
        Ok(())
    }

    async fn rename(&self, id: i64, title: Option<String>) -> anyhow::Result<ConversationRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("conversation {id} not found"))?;
        record.title = title;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud() {
        let api = InMemoryApi::new();

        let record = api.create().await.unwrap();
        assert!(record.title.is_none());
        assert!(!record.session_id.is_empty());

        let renamed = api
            .rename(record.id, Some("Sprint planning".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Sprint planning"));

        api.delete(record.id).await.unwrap();
        assert!(api.list().await.unwrap().is_empty());
        assert!(api.delete(record.id).await.is_err());
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let api = InMemoryApi::new();
        let a = api.create().await.unwrap();
        let b = api.create().await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.id, b.id);
    }
}
