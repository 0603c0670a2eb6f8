//! Vault-to-account binding
//!
//! A [`Binding`] persists which account a vault syncs against. At most one
//! binding exists per vault; its lifecycle is tied to vault identity, not
//! to any single device session.

use serde::{Deserialize, Serialize};

use super::newtypes::{UserId, VaultId};

/// Persisted association between a vault and the account it syncs against
///
/// Created on first successful sync; deleted when conflict resolution
/// chooses "sync to current account". A binding without a recorded user is
/// a legacy record and is adopted silently by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Server-assigned vault id
    vault_id: VaultId,
    /// Human-readable vault name at binding time
    vault_name: String,
    /// Account the vault is bound to (None for legacy records)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bound_user_id: Option<UserId>,
}

impl Binding {
    /// Creates a binding for the given vault and user
    #[must_use]
    pub fn new(vault_id: VaultId, vault_name: impl Into<String>, user: UserId) -> Self {
        Self {
            vault_id,
            vault_name: vault_name.into(),
            bound_user_id: Some(user),
        }
    }

    /// Returns the vault id
    #[must_use]
    pub fn vault_id(&self) -> &VaultId {
        &self.vault_id
    }

    /// Returns the vault name
    #[must_use]
    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    /// Returns the bound account, if recorded
    #[must_use]
    pub fn bound_user_id(&self) -> Option<&UserId> {
        self.bound_user_id.as_ref()
    }

    /// Returns true for legacy bindings with no recorded user
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.bound_user_id.is_none()
    }

    /// Returns true if the binding belongs to the given user
    ///
    /// Legacy bindings match any user (they are adopted silently).
    #[must_use]
    pub fn matches_user(&self, user: &UserId) -> bool {
        match &self.bound_user_id {
            Some(bound) => bound == user,
            None => true,
        }
    }

    /// Records the owning user on a legacy binding
    pub fn adopt_user(&mut self, user: UserId) {
        self.bound_user_id = Some(user);
    }
}
