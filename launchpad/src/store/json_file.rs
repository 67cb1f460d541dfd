//! Record store persisted as a single JSON document.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{RecordStore, RepositoryRecord, StoreError};
use crate::repository::RepositoryKey;

/// Record store that rewrites one JSON file on every change.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// document, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileRecordStore {
    path: PathBuf,
    records: Mutex<BTreeMap<RepositoryKey, RepositoryRecord>>,
}

impl JsonFileRecordStore {
    /// Opens the store at `path`, loading existing records if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), records = records.len(), "Opened record store");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeMap<RepositoryKey, RepositoryRecord>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn get(&self, key: &RepositoryKey) -> Result<Option<RepositoryRecord>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &RepositoryKey, record: RepositoryRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let previous = records.insert(key.clone(), record);
        if let Err(err) = self.persist(&records).await {
            match previous {
                Some(prev) => records.insert(key.clone(), prev),
                None => records.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &RepositoryKey) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let Some(previous) = records.remove(key) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&records).await {
            records.insert(key.clone(), previous);
            return Err(err);
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
