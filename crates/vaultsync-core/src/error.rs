//! Sync error taxonomy
//!
//! The classification here drives retry and status policy:
//! network-like errors push the engine to `Offline` and self-heal on the
//! next trigger; `Unauthorized` and `BindingConflict` require explicit user
//! action. Commit-time hash rejections are not errors at all: they travel
//! in the commit response body and re-queue the file for the next round.

use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::newtypes::UserId;

/// Errors surfaced by sync operations and their adapters
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport unreachable or timed out; round aborted, retried next trigger
    #[error("network error: {0}")]
    Network(String),

    /// Authentication expired (HTTP 401); sync disabled until re-auth
    #[error("unauthorized: credentials expired or invalid")]
    Unauthorized,

    /// Storage or vectorization quota exhausted (HTTP 403)
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Upstream failure (HTTP 5xx); treated like a network error, logged distinctly
    #[error("server error (status {status}): {message}")]
    Server {
        /// The HTTP status code returned
        status: u16,
        /// Server-provided error message, if any
        message: String,
    },

    /// Account switch detected on a bound vault; blocked pending a decision
    #[error("binding conflict: vault is bound to account {bound_user}")]
    BindingConflict {
        /// The account the vault is currently bound to
        bound_user: UserId,
    },

    /// Local index corruption or persistence failure
    #[error("index error: {0}")]
    Index(String),

    /// Domain validation failure crossing an adapter boundary
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True for failures that resolve themselves once connectivity returns
    ///
    /// These abort the current round, flip status to offline, and are
    /// retried on the next trigger with local state untouched.
    #[must_use]
    pub fn is_network_like(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// True for failures that need a human before sync can continue
    #[must_use]
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::BindingConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_like_classification() {
        assert!(SyncError::Network("timeout".into()).is_network_like());
        assert!(SyncError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_network_like());
        assert!(!SyncError::Unauthorized.is_network_like());
        assert!(!SyncError::QuotaExceeded("storage".into()).is_network_like());
    }

    #[test]
    fn test_user_action_classification() {
        assert!(SyncError::Unauthorized.requires_user_action());
        assert!(SyncError::BindingConflict {
            bound_user: UserId::new("alice").unwrap()
        }
        .requires_user_action());
        assert!(!SyncError::Network("down".into()).requires_user_action());
    }

    #[test]
    fn test_display_messages() {
        let err = SyncError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "server error (status 503): unavailable");
    }
}
