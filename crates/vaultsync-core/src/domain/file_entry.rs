//! Per-file index record
//!
//! A [`FileEntry`] tracks one logical file in the local index: its stable
//! id, current vault-relative path, current vector clock, and the
//! last-synced baseline (hash + clock) used by the diff/commit protocol.

use serde::{Deserialize, Serialize};

use super::clock::VectorClock;
use super::newtypes::{ContentHash, DeviceId, FileId, VaultPath};

/// State of one logical file in the local index
///
/// Owned exclusively by the file index of a single vault. Mutated on local
/// edit (own-clock increment) and on sync completion (baseline advance).
/// The file id is 1:1 with a file's logical history across renames; the
/// path is 1:1 with the file id only at a single instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Stable logical file id, assigned once and never reused
    file_id: FileId,
    /// Current vault-relative path
    path: VaultPath,
    /// Current vector clock of this file's edit history
    vector_clock: VectorClock,
    /// Content hash at the last successful sync (absent if never synced)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_synced_hash: Option<ContentHash>,
    /// Vector clock at the last successful sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_synced_clock: Option<VectorClock>,
}

impl FileEntry {
    /// Creates a new entry for a locally discovered file
    ///
    /// The initial clock records one edit by the discovering device.
    #[must_use]
    pub fn new_local(file_id: FileId, path: VaultPath, device: &DeviceId) -> Self {
        Self {
            file_id,
            path,
            vector_clock: VectorClock::new().incremented(device),
            last_synced_hash: None,
            last_synced_clock: None,
        }
    }

    /// Creates an entry adopting authoritative remote state wholesale
    ///
    /// Used after a download: the remote clock is taken as-is and the
    /// baseline is set to the downloaded content. This is the one mutation
    /// path that does not touch the local device's own counter.
    #[must_use]
    pub fn from_remote(
        file_id: FileId,
        path: VaultPath,
        clock: VectorClock,
        hash: ContentHash,
    ) -> Self {
        Self {
            file_id,
            path,
            vector_clock: clock.clone(),
            last_synced_hash: Some(hash),
            last_synced_clock: Some(clock),
        }
    }

    /// Records a local edit: increments this device's own clock entry
    pub fn record_local_edit(&mut self, device: &DeviceId) {
        self.vector_clock = self.vector_clock.incremented(device);
    }

    /// Moves the entry to a new path, preserving id and clock
    pub fn rename(&mut self, new_path: VaultPath) {
        self.path = new_path;
    }

    /// Replaces the current clock (conflict resolution merges)
    pub fn set_clock(&mut self, clock: VectorClock) {
        self.vector_clock = clock;
    }

    /// Advances the last-synced baseline to exactly the committed values
    pub fn mark_synced(&mut self, hash: ContentHash, clock: VectorClock) {
        self.last_synced_hash = Some(hash);
        self.last_synced_clock = Some(clock);
    }

    /// Adopts authoritative remote state (clock taken wholesale)
    pub fn adopt_remote(&mut self, clock: VectorClock, hash: ContentHash) {
        self.vector_clock = clock.clone();
        self.last_synced_hash = Some(hash);
        self.last_synced_clock = Some(clock);
    }

    /// Returns the stable file id
    #[must_use]
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// Returns the current path
    #[must_use]
    pub fn path(&self) -> &VaultPath {
        &self.path
    }

    /// Returns the current vector clock
    #[must_use]
    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    /// Returns the last-synced content hash, if the file has ever synced
    #[must_use]
    pub fn last_synced_hash(&self) -> Option<&ContentHash> {
        self.last_synced_hash.as_ref()
    }

    /// Returns the clock captured at the last successful sync
    #[must_use]
    pub fn last_synced_clock(&self) -> Option<&VectorClock> {
        self.last_synced_clock.as_ref()
    }

    /// Returns true if the file has never completed a sync round
    #[must_use]
    pub fn never_synced(&self) -> bool {
        self.last_synced_hash.is_none()
    }
}
