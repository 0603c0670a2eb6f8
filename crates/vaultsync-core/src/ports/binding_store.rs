//! Binding store port (driven/secondary port)
//!
//! Persistence seam for the vault-to-account binding. A store instance is
//! scoped to a single vault (keyed by vault path at construction), so the
//! interface deals with at most one record.

use crate::domain::binding::Binding;
use crate::error::SyncError;

/// Port trait for binding persistence, one record per vault
#[async_trait::async_trait]
pub trait IBindingStore: Send + Sync {
    /// Loads the vault's binding, or `None` if it was never bound
    async fn get(&self) -> Result<Option<Binding>, SyncError>;

    /// Creates or replaces the vault's binding
    async fn save(&self, binding: &Binding) -> Result<(), SyncError>;

    /// Deletes the vault's binding; returns whether one existed
    async fn delete(&self) -> Result<bool, SyncError>;
}
