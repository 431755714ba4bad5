use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use super::draft::Draft;
use super::key::DraftKey;

/// Errors that can occur during draft persistence operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("draft for {key} changed underneath this trigger (expected version {expected:?}, found {found:?})")]
    VersionConflict {
        key: DraftKey,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("storage backend failure: {reason}")]
    Backend { reason: String },
}

/// A draft plus the version stamp of the record it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDraft {
    pub draft: Draft,
    pub version: u64,
}

/// Keyed persistence for drafts. At most one record per key; reads are
/// always consistent because every trigger is a fresh request. The
/// versioned put gives near-simultaneous triggers for one key a defined
/// loser instead of a silent lost update.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, key: &DraftKey) -> Result<Option<StoredDraft>, StoreError>;

    /// Unconditional upsert, implemented as delete-then-create since the
    /// record is always written whole
    async fn put(&self, key: DraftKey, draft: Draft) -> Result<(), StoreError>;

    /// Upsert that fails if the stored version is not the expected one.
    /// `expected == None` asserts the key is currently vacant.
    async fn put_if_version(
        &self,
        key: DraftKey,
        draft: Draft,
        expected: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Remove the draft. Returns whether anything existed.
    async fn delete(&self, key: &DraftKey) -> Result<bool, StoreError>;
}

/// In-memory store used by the server and in tests
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    drafts: Mutex<HashMap<DraftKey, StoredDraft>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, key: &DraftKey) -> Result<Option<StoredDraft>, StoreError> {
        Ok(self.drafts.lock().await.get(key).cloned())
    }

    async fn put(&self, key: DraftKey, draft: Draft) -> Result<(), StoreError> {
        let mut drafts = self.drafts.lock().await;
        let version = drafts.remove(&key).map(|d| d.version + 1).unwrap_or(1);
        drafts.insert(key, StoredDraft { draft, version });
        Ok(())
    }

    async fn put_if_version(
        &self,
        key: DraftKey,
        draft: Draft,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut drafts = self.drafts.lock().await;
        let found = drafts.get(&key).map(|d| d.version);
        if found != expected {
            return Err(StoreError::VersionConflict {
                key,
                expected,
                found,
            });
        }

        let version = found.map(|v| v + 1).unwrap_or(1);
        drafts.remove(&key);
        drafts.insert(key, StoredDraft { draft, version });
        Ok(())
    }

    async fn delete(&self, key: &DraftKey) -> Result<bool, StoreError> {
        Ok(self.drafts.lock().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::draft::IncidentDraft;
    use chrono::Utc;

    fn draft() -> Draft {
        Draft::Incident(IncidentDraft::begin("API down", Utc::now()))
    }

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let store = InMemoryWorkflowStore::new();
        let key = DraftKey::incident("u1", "r1");

        store.put(key.clone(), draft()).await.unwrap();
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn upsert_bumps_version() {
        let store = InMemoryWorkflowStore::new();
        let key = DraftKey::incident("u1", "r1");

        store.put(key.clone(), draft()).await.unwrap();
        store.put(key.clone(), draft()).await.unwrap();

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn versioned_put_rejects_stale_writer() {
        let store = InMemoryWorkflowStore::new();
        let key = DraftKey::incident("u1", "r1");

        store
            .put_if_version(key.clone(), draft(), None)
            .await
            .unwrap();

        // A second writer that still believes the key is vacant loses
        let result = store.put_if_version(key.clone(), draft(), None).await;
        assert!(matches!(
            result,
            Err(StoreError::VersionConflict { found: Some(1), .. })
        ));

        // The winner's successor write with the current version succeeds
        store
            .put_if_version(key.clone(), draft(), Some(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = InMemoryWorkflowStore::new();
        let key = DraftKey::update("u1", "r1");

        assert!(!store.delete(&key).await.unwrap());
        store.put(key.clone(), draft()).await.unwrap();
        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn kinds_do_not_shadow_each_other() {
        let store = InMemoryWorkflowStore::new();
        let creation = DraftKey::incident("u1", "r1");
        let update = DraftKey::update("u1", "r1");

        store.put(creation.clone(), draft()).await.unwrap();
        assert!(store.get(&update).await.unwrap().is_none());
    }
}
