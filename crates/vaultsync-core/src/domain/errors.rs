//! Domain error types
//!
//! Validation failures raised by domain constructors. Everything that can
//! go wrong past construction is covered by [`crate::error::SyncError`].

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid vault-relative path (absolute, empty, or escaping the root)
    #[error("Invalid vault path: {0}")]
    InvalidPath(String),

    /// Invalid content hash format (expected lowercase SHA-256 hex)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid identifier (empty or malformed)
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
