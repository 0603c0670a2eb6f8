//! JSON snapshot persistence
//!
//! One index file per vault, written atomically: the snapshot is serialized
//! to a sibling temp file and renamed into place, so a crash mid-write
//! leaves the previous snapshot intact.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use vaultsync_core::error::SyncError;
use vaultsync_core::ports::index_store::{FileIndexSnapshot, IIndexStore};

/// File-backed index store
pub struct JsonIndexStore {
    /// Path of the snapshot file
    path: PathBuf,
}

impl JsonIndexStore {
    /// Creates a store writing to the given snapshot path
    #[must_use]
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self { path })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait::async_trait]
impl IIndexStore for JsonIndexStore {
    async fn load(&self) -> Result<Option<FileIndexSnapshot>, SyncError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot: FileIndexSnapshot = serde_json::from_slice(&raw)
            .map_err(|e| SyncError::Index(format!("corrupt index snapshot: {e}")))?;
        Ok(Some(snapshot))
    }

    async fn persist(&self, snapshot: &FileIndexSnapshot) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| SyncError::Index(format!("serialize index snapshot: {e}")))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &raw).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            entries = snapshot.files.len(),
            "Index snapshot persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_core::domain::file_entry::FileEntry;
    use vaultsync_core::domain::newtypes::{DeviceId, FileId, VaultPath};
    use vaultsync_core::ports::index_store::INDEX_FORMAT_VERSION;

    fn snapshot_with_one_file() -> FileIndexSnapshot {
        FileIndexSnapshot {
            version: INDEX_FORMAT_VERSION,
            files: vec![FileEntry::new_local(
                FileId::generate(),
                VaultPath::new("notes/a.md").unwrap(),
                &DeviceId::new("dev-1").unwrap(),
            )],
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonIndexStore::new(dir.path().join("index.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonIndexStore::new(dir.path().join("index.json"));

        let snapshot = snapshot_with_one_file();
        store.persist(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.version, snapshot.version);
        assert_eq!(loaded.files, snapshot.files);
    }

    #[tokio::test]
    async fn test_persist_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonIndexStore::new(dir.path().join("state/vaults/index.json"));
        store.persist(&snapshot_with_one_file()).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let store = JsonIndexStore::new(path.clone());
        store.persist(&snapshot_with_one_file()).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["index.json"]);
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = JsonIndexStore::new(path);
        assert!(matches!(
            store.load().await,
            Err(SyncError::Index(_))
        ));
    }
}
