//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for domain identifiers and values. Each newtype
//! ensures data validity at construction time, so the rest of the system
//! never has to re-check.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Opaque string identifiers
// ============================================================================

macro_rules! opaque_string_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, rejecting empty values
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::InvalidId(format!(
                        "{} must not be empty",
                        $label
                    )));
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

opaque_string_id!(
    /// Server-assigned identifier for a vault
    VaultId,
    "VaultId"
);

opaque_string_id!(
    /// Identifier of the account a vault is bound to
    UserId,
    "UserId"
);

opaque_string_id!(
    /// Stable logical identifier of a synced file
    ///
    /// Assigned exactly once per logical file and never reused; survives
    /// renames. Locally generated ids are UUIDs, server-confirmed ids are
    /// adopted verbatim.
    FileId,
    "FileId"
);

impl FileId {
    /// Generates a fresh, locally-assigned file id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Stable identifier of this device within a vault's vector clocks
///
/// A device only ever increments its own entry in a clock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device id, rejecting empty values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidId(
                "DeviceId must not be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Generates a fresh device id (first run on a new device)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a pending binding-conflict decision request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(Uuid);

impl DecisionId {
    /// Creates a new random DecisionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DecisionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DecisionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid DecisionId: {e}")))
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// SHA-256 content hash, lowercase hex
///
/// Content addressing makes uploads idempotent: repeating an upload of the
/// same bytes is always safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Validates and wraps an existing hash string
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(value));
        }
        Ok(Self(value.to_lowercase()))
    }

    /// Computes the hash of a byte slice
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Returns the hash as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// VaultPath
// ============================================================================

/// A vault-relative file path, normalized to forward slashes
///
/// Invariants enforced at construction:
/// - non-empty, relative (no leading `/`)
/// - no `.` or `..` components, no empty components
/// - no backslashes (normalized before validation)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultPath(String);

impl VaultPath {
    /// Creates a validated vault-relative path
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().replace('\\', "/");
        if value.is_empty() {
            return Err(DomainError::InvalidPath("empty path".to_string()));
        }
        if value.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "path must be relative: {value}"
            )));
        }
        for component in value.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(DomainError::InvalidPath(format!(
                    "invalid path component in: {value}"
                )));
            }
        }
        Ok(Self(value))
    }

    /// Returns the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final path component
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the parent path, or `None` for top-level entries
    #[must_use]
    pub fn parent(&self) -> Option<VaultPath> {
        self.0.rsplit_once('/').map(|(p, _)| Self(p.to_string()))
    }
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VaultPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
