//! JSON binding persistence
//!
//! One binding record per vault, keyed by vault path at construction time.
//! Written atomically like the index snapshot: temp file, then rename.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use vaultsync_core::domain::binding::Binding;
use vaultsync_core::error::SyncError;
use vaultsync_core::ports::binding_store::IBindingStore;

/// File-backed binding store for a single vault
pub struct JsonBindingStore {
    /// Path of the binding record file
    path: PathBuf,
}

impl JsonBindingStore {
    /// Creates a store writing to the given record path
    #[must_use]
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self { path })
    }

    /// Derives the record path for a vault under a state directory
    ///
    /// The vault path is flattened into a stable file name so two vaults
    /// never share a record.
    #[must_use]
    pub fn record_path(state_dir: &std::path::Path, vault_path: &std::path::Path) -> PathBuf {
        let flat: String = vault_path
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        state_dir.join("bindings").join(format!("{flat}.json"))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait::async_trait]
impl IBindingStore for JsonBindingStore {
    async fn get(&self) -> Result<Option<Binding>, SyncError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let binding: Binding = serde_json::from_slice(&raw)
            .map_err(|e| SyncError::Index(format!("corrupt binding record: {e}")))?;
        Ok(Some(binding))
    }

    async fn save(&self, binding: &Binding) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(binding)
            .map_err(|e| SyncError::Index(format!("serialize binding record: {e}")))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &raw).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), vault_id = %binding.vault_id(), "Binding saved");
        Ok(())
    }

    async fn delete(&self) -> Result<bool, SyncError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Binding deleted");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
