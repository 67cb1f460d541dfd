//! Repository record store.
//!
//! The engine reads and writes repository records only through
//! [`RecordStore`]. Implementations must offer read-your-writes consistency
//! per key; the engine never has more than one write in flight per key.

mod json_file;
mod memory;

pub use json_file::JsonFileRecordStore;
pub use memory::InMemoryRecordStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::{RepositoryConfig, RepositoryKey, RepositoryState};

/// Declared configuration plus last-known state of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// The declared configuration.
    pub config: RepositoryConfig,
    /// The engine-owned lifecycle state.
    #[serde(default)]
    pub state: RepositoryState,
}

impl RepositoryRecord {
    /// Creates a record with a fresh state.
    #[must_use]
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            state: RepositoryState::new(),
        }
    }

    /// Returns the repository key.
    #[must_use]
    pub fn key(&self) -> RepositoryKey {
        self.config.key()
    }
}

/// Errors raised by record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("record store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("record store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store cannot serve requests.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value access to repository records.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Fetches a record.
    async fn get(&self, key: &RepositoryKey) -> Result<Option<RepositoryRecord>, StoreError>;

    /// Inserts or replaces a record.
    async fn put(&self, key: &RepositoryKey, record: RepositoryRecord) -> Result<(), StoreError>;

    /// Removes a record, returning true if it existed.
    async fn delete(&self, key: &RepositoryKey) -> Result<bool, StoreError>;

    /// Returns every record ordered by key.
    async fn list(&self) -> Result<Vec<RepositoryRecord>, StoreError>;
}
