//! Local vault port (driven/secondary port)
//!
//! File I/O under the vault root, plus the change-event shape emitted by
//! the external filesystem watcher. The watcher itself (tree diffing,
//! caching, OS event plumbing) is an external collaborator; this core only
//! consumes its events as sync triggers.

use crate::domain::newtypes::{ContentHash, VaultPath};
use crate::error::SyncError;

/// A filesystem change reported by the external watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file appeared at the given path
    Added(VaultPath),
    /// An existing file's content changed
    Changed(VaultPath),
    /// The file at the given path was deleted
    Removed(VaultPath),
}

impl ChangeEvent {
    /// Returns the path this event refers to
    #[must_use]
    pub fn path(&self) -> &VaultPath {
        match self {
            ChangeEvent::Added(p) | ChangeEvent::Changed(p) | ChangeEvent::Removed(p) => p,
        }
    }
}

/// Port trait for file operations under the vault root
///
/// All paths are vault-relative and pre-validated; implementations resolve
/// them against their configured root and must not escape it.
#[async_trait::async_trait]
pub trait ILocalVault: Send + Sync {
    /// Reads a file's content
    async fn read(&self, path: &VaultPath) -> Result<Vec<u8>, SyncError>;

    /// Writes a file, creating parent directories as needed
    async fn write(&self, path: &VaultPath, data: &[u8]) -> Result<(), SyncError>;

    /// Removes a file (missing files are not an error)
    async fn remove(&self, path: &VaultPath) -> Result<(), SyncError>;

    /// Renames a file within the vault
    async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), SyncError>;

    /// Returns whether a file exists at the path
    async fn exists(&self, path: &VaultPath) -> Result<bool, SyncError>;

    /// Computes the content hash of a file
    async fn hash(&self, path: &VaultPath) -> Result<ContentHash, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_path() {
        let p = VaultPath::new("a.md").unwrap();
        assert_eq!(ChangeEvent::Added(p.clone()).path(), &p);
        assert_eq!(ChangeEvent::Changed(p.clone()).path(), &p);
        assert_eq!(ChangeEvent::Removed(p.clone()).path(), &p);
    }
}
