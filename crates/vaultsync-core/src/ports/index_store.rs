//! Index store port (driven/secondary port)
//!
//! Persistence seam for the local file index. The index itself lives in
//! memory and owns all mutation rules; this port only loads and persists
//! versioned snapshots, one per vault.

use serde::{Deserialize, Serialize};

use crate::domain::file_entry::FileEntry;
use crate::error::SyncError;

/// Current on-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Persisted shape of one vault's file index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIndexSnapshot {
    /// Format version for forward-compatible migrations
    pub version: u32,
    /// All live entries of the vault
    pub files: Vec<FileEntry>,
}

/// Port trait for index snapshot persistence
#[async_trait::async_trait]
pub trait IIndexStore: Send + Sync {
    /// Loads the persisted snapshot, or `None` if the vault has no index yet
    async fn load(&self) -> Result<Option<FileIndexSnapshot>, SyncError>;

    /// Persists a snapshot atomically (readers never observe a torn write)
    async fn persist(&self, snapshot: &FileIndexSnapshot) -> Result<(), SyncError>;
}
