//! Local vault adapter over tokio's filesystem API
//!
//! Resolves validated vault-relative paths against a configured root.
//! Path validation at the [`VaultPath`] boundary already excludes `..`
//! components, so resolved paths cannot escape the root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use vaultsync_core::domain::newtypes::{ContentHash, VaultPath};
use vaultsync_core::error::SyncError;
use vaultsync_core::ports::local_vault::ILocalVault;

/// File operations under a single vault root
pub struct TokioLocalVault {
    root: PathBuf,
}

impl TokioLocalVault {
    /// Creates an adapter rooted at the given directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { root: root.into() })
    }

    /// Returns the vault root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &VaultPath) -> PathBuf {
        self.root.join(path.as_str())
    }
}

#[async_trait::async_trait]
impl ILocalVault for TokioLocalVault {
    async fn read(&self, path: &VaultPath) -> Result<Vec<u8>, SyncError> {
        Ok(tokio::fs::read(self.resolve(path)).await?)
    }

    async fn write(&self, path: &VaultPath, data: &[u8]) -> Result<(), SyncError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, data).await?;
        debug!(path = %path, bytes = data.len(), "Wrote vault file");
        Ok(())
    }

    async fn remove(&self, path: &VaultPath) -> Result<(), SyncError> {
        match tokio::fs::remove_file(self.resolve(path)).await {
            Ok(()) => {
                debug!(path = %path, "Removed vault file");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), SyncError> {
        let target = self.resolve(to);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(self.resolve(from), target).await?;
        debug!(from = %from, to = %to, "Renamed vault file");
        Ok(())
    }

    async fn exists(&self, path: &VaultPath) -> Result<bool, SyncError> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    async fn hash(&self, path: &VaultPath) -> Result<ContentHash, SyncError> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(ContentHash::of(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> VaultPath {
        VaultPath::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = TokioLocalVault::new(dir.path());

        vault.write(&path("notes/a.md"), b"hello").await.unwrap();
        assert_eq!(vault.read(&path("notes/a.md")).await.unwrap(), b"hello");
        assert!(vault.exists(&path("notes/a.md")).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let vault = TokioLocalVault::new(dir.path());

        vault.write(&path("a.md"), b"content").await.unwrap();
        assert_eq!(
            vault.hash(&path("a.md")).await.unwrap(),
            ContentHash::of(b"content")
        );
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let vault = TokioLocalVault::new(dir.path());
        vault.remove(&path("ghost.md")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_creates_target_parent() {
        let dir = tempfile::tempdir().unwrap();
        let vault = TokioLocalVault::new(dir.path());

        vault.write(&path("a.md"), b"x").await.unwrap();
        vault
            .rename(&path("a.md"), &path("deep/nested/b.md"))
            .await
            .unwrap();
        assert!(!vault.exists(&path("a.md")).await.unwrap());
        assert_eq!(vault.read(&path("deep/nested/b.md")).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_read_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let vault = TokioLocalVault::new(dir.path());
        let err = vault.read(&path("ghost.md")).await.unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
