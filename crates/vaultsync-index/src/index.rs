//! The local file index
//!
//! One [`FileIndex`] exists per vault. It is the only writer of that
//! vault's persisted snapshot, and every mutation persists immediately so
//! a crash never loses an assigned file id.
//!
//! ## Invariants
//!
//! - A file id is assigned exactly once per logical file and survives
//!   renames; it is never reused.
//! - A path maps to at most one live entry at any instant.
//! - Every mutation increments the local device's own clock entry, except
//!   [`set_many`](FileIndex::set_many), which adopts authoritative remote
//!   state wholesale after a download.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use vaultsync_core::domain::clock::VectorClock;
use vaultsync_core::domain::file_entry::FileEntry;
use vaultsync_core::domain::newtypes::{ContentHash, DeviceId, FileId, VaultPath};
use vaultsync_core::error::SyncError;
use vaultsync_core::ports::index_store::{FileIndexSnapshot, IIndexStore, INDEX_FORMAT_VERSION};

/// Server-confirmed state of one downloaded file
///
/// Input to [`FileIndex::set_many`]: the (path, file id) pair plus the
/// authoritative clock and content hash the server reported.
#[derive(Debug, Clone)]
pub struct SyncedRemoteFile {
    /// Server-confirmed file id
    pub file_id: FileId,
    /// Vault-relative path the content was written to
    pub path: VaultPath,
    /// The server's clock, adopted wholesale
    pub vector_clock: VectorClock,
    /// Hash of the downloaded content
    pub content_hash: ContentHash,
}

/// In-memory file index for a single vault
pub struct FileIndex {
    /// Snapshot persistence
    store: Arc<dyn IIndexStore>,
    /// This device's identity within vector clocks
    device_id: DeviceId,
    /// Live entries keyed by path (ordered for deterministic snapshots)
    entries: BTreeMap<VaultPath, FileEntry>,
}

impl FileIndex {
    /// Loads the index from its store, starting empty if none exists
    pub async fn load(
        store: Arc<dyn IIndexStore>,
        device_id: DeviceId,
    ) -> Result<Self, SyncError> {
        let snapshot = store.load().await?;
        let entries = match snapshot {
            Some(snapshot) => {
                if snapshot.version > INDEX_FORMAT_VERSION {
                    return Err(SyncError::Index(format!(
                        "index format version {} is newer than supported {}",
                        snapshot.version, INDEX_FORMAT_VERSION
                    )));
                }
                let mut entries = BTreeMap::new();
                for entry in snapshot.files {
                    if let Some(dup) = entries.insert(entry.path().clone(), entry) {
                        return Err(SyncError::Index(format!(
                            "duplicate path in persisted index: {}",
                            dup.path()
                        )));
                    }
                }
                entries
            }
            None => BTreeMap::new(),
        };

        info!(entries = entries.len(), "File index loaded");
        Ok(Self {
            store,
            device_id,
            entries,
        })
    }

    /// Returns the entry at a path, if one exists
    #[must_use]
    pub fn get(&self, path: &VaultPath) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Returns the entry with the given file id, if present
    #[must_use]
    pub fn by_file_id(&self, file_id: &FileId) -> Option<&FileEntry> {
        self.entries.values().find(|e| e.file_id() == file_id)
    }

    /// Iterates over all live entries in path order
    pub fn live_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index has no live entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the existing entry for a path, or assigns a fresh file id
    ///
    /// Assignment happens exactly once per live path and is persisted
    /// before the new entry is returned.
    pub async fn get_or_create(&mut self, path: &VaultPath) -> Result<FileEntry, SyncError> {
        if let Some(existing) = self.entries.get(path) {
            return Ok(existing.clone());
        }

        let entry = FileEntry::new_local(FileId::generate(), path.clone(), &self.device_id);
        debug!(path = %path, file_id = %entry.file_id(), "Assigned new file id");
        self.entries.insert(path.clone(), entry.clone());
        self.persist().await?;
        Ok(entry)
    }

    /// Records a local edit: increments this device's clock entry
    ///
    /// Creates the entry first if the path is new (the creation itself
    /// counts as the first edit).
    pub async fn record_local_edit(&mut self, path: &VaultPath) -> Result<FileEntry, SyncError> {
        let entry = match self.entries.get_mut(path) {
            Some(entry) => {
                entry.record_local_edit(&self.device_id);
                entry.clone()
            }
            None => {
                let entry = FileEntry::new_local(FileId::generate(), path.clone(), &self.device_id);
                self.entries.insert(path.clone(), entry.clone());
                entry
            }
        };
        self.persist().await?;
        Ok(entry)
    }

    /// Moves an entry to a new path, preserving file id and clock
    pub async fn rename(
        &mut self,
        old_path: &VaultPath,
        new_path: &VaultPath,
    ) -> Result<FileEntry, SyncError> {
        if self.entries.contains_key(new_path) {
            return Err(SyncError::Index(format!(
                "rename target already indexed: {new_path}"
            )));
        }
        let mut entry = self
            .entries
            .remove(old_path)
            .ok_or_else(|| SyncError::Index(format!("rename source not indexed: {old_path}")))?;
        entry.rename(new_path.clone());
        self.entries.insert(new_path.clone(), entry.clone());
        self.persist().await?;
        Ok(entry)
    }

    /// Removes an entry as a local deletion, returning its tombstone
    ///
    /// The deletion counts as an edit: the entry's own-device counter is
    /// incremented before removal, so the tombstone's clock can be tested
    /// for dominance against the server's copy.
    pub async fn remove(&mut self, path: &VaultPath) -> Result<Option<FileEntry>, SyncError> {
        let Some(mut entry) = self.entries.remove(path) else {
            return Ok(None);
        };
        entry.record_local_edit(&self.device_id);
        debug!(path = %path, file_id = %entry.file_id(), "Tombstoned local deletion");
        self.persist().await?;
        Ok(Some(entry))
    }

    /// Drops an entry without a clock bump (server-initiated deletion)
    pub async fn forget(&mut self, path: &VaultPath) -> Result<Option<FileEntry>, SyncError> {
        let removed = self.entries.remove(path);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Bulk-applies server-confirmed state after downloads
    ///
    /// Adopts the remote clock wholesale for each confirmed file. This is
    /// authoritative-state reconciliation, the one mutation that does not
    /// increment the local device's own entry. Replaces any live entry at
    /// the same path, including its file id.
    pub async fn set_many(&mut self, confirmed: Vec<SyncedRemoteFile>) -> Result<(), SyncError> {
        if confirmed.is_empty() {
            return Ok(());
        }
        for file in confirmed {
            let entry = FileEntry::from_remote(
                file.file_id,
                file.path.clone(),
                file.vector_clock,
                file.content_hash,
            );
            self.entries.insert(file.path, entry);
        }
        self.persist().await
    }

    /// Advances a file's baseline to exactly the committed hash and clock
    ///
    /// Returns false if the file id is no longer live (deleted mid-round).
    pub async fn mark_synced(
        &mut self,
        file_id: &FileId,
        hash: ContentHash,
        clock: VectorClock,
    ) -> Result<bool, SyncError> {
        let Some(entry) = self.entries.values_mut().find(|e| e.file_id() == file_id) else {
            return Ok(false);
        };
        entry.set_clock(clock.clone());
        entry.mark_synced(hash, clock);
        self.persist().await?;
        Ok(true)
    }

    /// Persists the current state as a versioned snapshot
    async fn persist(&self) -> Result<(), SyncError> {
        let snapshot = FileIndexSnapshot {
            version: INDEX_FORMAT_VERSION,
            files: self.entries.values().cloned().collect(),
        };
        self.store.persist(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store fake for index unit tests
    struct MemoryStore {
        snapshot: Mutex<Option<FileIndexSnapshot>>,
    }

    impl MemoryStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                snapshot: Mutex::new(None),
            })
        }

        fn persisted_paths(&self) -> Vec<String> {
            self.snapshot
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.files.iter().map(|f| f.path().to_string()).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl IIndexStore for MemoryStore {
        async fn load(&self) -> Result<Option<FileIndexSnapshot>, SyncError> {
            Ok(self.snapshot.lock().unwrap().clone())
        }

        async fn persist(&self, snapshot: &FileIndexSnapshot) -> Result<(), SyncError> {
            *self.snapshot.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn device() -> DeviceId {
        DeviceId::new("dev-1").unwrap()
    }

    fn path(s: &str) -> VaultPath {
        VaultPath::new(s).unwrap()
    }

    async fn empty_index(store: Arc<MemoryStore>) -> FileIndex {
        FileIndex::load(store, device()).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_assigns_id_once() {
        let store = MemoryStore::new();
        let mut index = empty_index(store.clone()).await;

        let first = index.get_or_create(&path("a.md")).await.unwrap();
        let second = index.get_or_create(&path("a.md")).await.unwrap();
        assert_eq!(first.file_id(), second.file_id());
        assert_eq!(index.len(), 1);
        assert_eq!(store.persisted_paths(), vec!["a.md"]);
    }

    #[tokio::test]
    async fn test_record_local_edit_bumps_clock() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        let created = index.record_local_edit(&path("a.md")).await.unwrap();
        assert_eq!(created.vector_clock().get(&device()), 1);

        let edited = index.record_local_edit(&path("a.md")).await.unwrap();
        assert_eq!(edited.vector_clock().get(&device()), 2);
        assert_eq!(created.file_id(), edited.file_id());
    }

    #[tokio::test]
    async fn test_rename_preserves_id_and_clock() {
        let store = MemoryStore::new();
        let mut index = empty_index(store.clone()).await;

        let before = index.get_or_create(&path("old.md")).await.unwrap();
        let after = index.rename(&path("old.md"), &path("new.md")).await.unwrap();

        assert_eq!(before.file_id(), after.file_id());
        assert_eq!(before.vector_clock(), after.vector_clock());
        assert!(index.get(&path("old.md")).is_none());
        assert_eq!(store.persisted_paths(), vec!["new.md"]);
    }

    #[tokio::test]
    async fn test_rename_rejects_occupied_target() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        index.get_or_create(&path("a.md")).await.unwrap();
        index.get_or_create(&path("b.md")).await.unwrap();
        assert!(index.rename(&path("a.md"), &path("b.md")).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_returns_bumped_tombstone() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        let live = index.get_or_create(&path("a.md")).await.unwrap();
        let tombstone = index.remove(&path("a.md")).await.unwrap().unwrap();

        assert_eq!(tombstone.file_id(), live.file_id());
        assert!(tombstone.vector_clock().dominates(live.vector_clock()));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_none() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;
        assert!(index.remove(&path("ghost.md")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forget_does_not_bump_clock() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        let live = index.get_or_create(&path("a.md")).await.unwrap();
        let forgotten = index.forget(&path("a.md")).await.unwrap().unwrap();
        assert_eq!(forgotten.vector_clock(), live.vector_clock());
    }

    #[tokio::test]
    async fn test_set_many_adopts_remote_clock_wholesale() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        // Local entry with this device's clock
        index.record_local_edit(&path("a.md")).await.unwrap();

        let remote_clock = VectorClock::from([(DeviceId::new("dev-2").unwrap(), 9)]);
        let remote_hash = ContentHash::of(b"remote content");
        index
            .set_many(vec![SyncedRemoteFile {
                file_id: FileId::new("srv-1").unwrap(),
                path: path("a.md"),
                vector_clock: remote_clock.clone(),
                content_hash: remote_hash.clone(),
            }])
            .await
            .unwrap();

        let entry = index.get(&path("a.md")).unwrap();
        assert_eq!(entry.file_id().as_str(), "srv-1");
        assert_eq!(entry.vector_clock(), &remote_clock);
        assert_eq!(entry.last_synced_hash(), Some(&remote_hash));
        assert_eq!(entry.last_synced_clock(), Some(&remote_clock));
    }

    #[tokio::test]
    async fn test_mark_synced_advances_baseline() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;

        let entry = index.record_local_edit(&path("a.md")).await.unwrap();
        let hash = ContentHash::of(b"content");
        let clock = entry.vector_clock().clone();

        let found = index
            .mark_synced(entry.file_id(), hash.clone(), clock.clone())
            .await
            .unwrap();
        assert!(found);

        let synced = index.get(&path("a.md")).unwrap();
        assert_eq!(synced.last_synced_hash(), Some(&hash));
        assert_eq!(synced.last_synced_clock(), Some(&clock));
    }

    #[tokio::test]
    async fn test_mark_synced_unknown_id_is_false() {
        let store = MemoryStore::new();
        let mut index = empty_index(store).await;
        let found = index
            .mark_synced(
                &FileId::new("ghost").unwrap(),
                ContentHash::of(b"x"),
                VectorClock::new(),
            )
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_reload_round_trips_entries() {
        let store = MemoryStore::new();
        let mut index = empty_index(store.clone()).await;
        index.get_or_create(&path("a.md")).await.unwrap();
        index.get_or_create(&path("b/c.md")).await.unwrap();

        let reloaded = FileIndex::load(store, device()).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get(&path("b/c.md")).is_some());
    }

    #[tokio::test]
    async fn test_load_rejects_future_version() {
        let store = MemoryStore::new();
        *store.snapshot.lock().unwrap() = Some(FileIndexSnapshot {
            version: INDEX_FORMAT_VERSION + 1,
            files: Vec::new(),
        });
        assert!(FileIndex::load(store, device()).await.is_err());
    }
}
