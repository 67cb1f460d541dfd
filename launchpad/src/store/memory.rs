//! In-memory record store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RecordStore, RepositoryRecord, StoreError};
use crate::repository::RepositoryKey;

/// Record store backed by a concurrent map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: DashMap<RepositoryKey, RepositoryRecord>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = RepositoryRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.key(), record);
        }
        store
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RepositoryKey) -> Result<Option<RepositoryRecord>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &RepositoryKey, record: RepositoryRecord) -> Result<(), StoreError> {
        self.records.insert(key.clone(), record);
        Ok(())
    }

    async fn delete(&self, key: &RepositoryKey) -> Result<bool, StoreError> {
        Ok(self.records.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
        let mut records: Vec<_> = self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by_key(RepositoryRecord::key);
        Ok(records)
    }
}
