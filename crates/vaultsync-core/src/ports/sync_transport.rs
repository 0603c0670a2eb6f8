//! Sync transport port (driven/secondary port)
//!
//! Interface to the authenticated sync backend: the diff/commit protocol
//! plus the vectorize side channel and the usage endpoint. The primary
//! implementation speaks JSON over HTTPS; tests substitute in-memory fakes.
//!
//! ## Design Notes
//!
//! - DTOs here are port-level wire shapes, not domain entities. The engine
//!   maps them to and from [`FileEntry`](crate::domain::FileEntry) state.
//! - Methods return [`SyncError`] so callers can branch on the taxonomy
//!   (network vs. auth vs. quota) instead of string-matching.
//! - Transfer URLs issued by the server are opaque and absolute; `upload`
//!   and `download` operate on them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clock::VectorClock;
use crate::error::SyncError;

// ============================================================================
// Diff request/response
// ============================================================================

/// One file of the client's inventory, sent with every diff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileDto {
    /// Vault-relative path
    pub path: String,
    /// SHA-256 of the current local content
    pub content_hash: String,
    /// Current vector clock of the file
    pub vector_clock: VectorClock,
}

/// Request body for `POST /sync/diff`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    /// The vault being synced
    pub vault_id: String,
    /// The requesting device
    pub device_id: String,
    /// Full inventory of live local files
    pub local_files: Vec<LocalFileDto>,
}

/// Kind of action the server asks the client to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncActionKind {
    /// Push local content to the server
    Upload,
    /// Fetch remote content and adopt its state
    Download,
    /// Remove the local copy (remote deletion dominates)
    Delete,
    /// Concurrent edit: local wins at the canonical path, remote is
    /// preserved as a renamed sibling copy
    Conflict,
}

/// One entry of the ordered action list returned by diff
///
/// Produced by the server, consumed exactly once by the engine within the
/// same round; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncActionDto {
    /// Server-known file id (absent for files the server has never seen)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Vault-relative path the action applies to
    pub path: String,
    /// What to do
    pub action: SyncActionKind,
    /// URL to fetch remote content from (download/conflict)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// URL to push local content to (upload/conflict)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    /// Sibling name for the preserved remote copy (conflict only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_rename: Option<String>,
    /// Server-assigned id for the conflict copy (conflict only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_copy_id: Option<String>,
    /// URL to push the conflict copy to (conflict only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_copy_upload_url: Option<String>,
    /// The server's current clock for this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_vector_clock: Option<VectorClock>,
}

/// Response body for `POST /sync/diff`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResponse {
    /// Ordered list of actions for the client to execute
    #[serde(default)]
    pub actions: Vec<SyncActionDto>,
}

// ============================================================================
// Commit request/response
// ============================================================================

/// One executed file reported at commit time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedFileDto {
    /// Stable file id (client-assigned for new uploads)
    pub file_id: String,
    /// The action that was executed
    pub action: SyncActionKind,
    /// Vault-relative path
    pub path: String,
    /// Hash of the content now at this path
    pub content_hash: String,
    /// Clock value being committed
    pub vector_clock: VectorClock,
    /// Optimistic-concurrency marker: the hash the client believes the
    /// server currently holds (absent for files the server has never seen)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
}

/// Request body for `POST /sync/commit`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// The vault being synced
    pub vault_id: String,
    /// The committing device
    pub device_id: String,
    /// Files whose transfers completed this round
    pub completed: Vec<CompletedFileDto>,
    /// File ids deleted locally with dominating clocks
    pub deleted: Vec<String>,
    /// Whether uploaded files should be queued for vectorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorize_enabled: Option<bool>,
}

/// A file rejected at commit time by the optimistic-concurrency check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitConflictDto {
    /// The rejected file's id
    pub file_id: String,
    /// Vault-relative path
    pub path: String,
    /// The hash the client expected
    pub expected_hash: String,
    /// The hash the server actually holds
    pub current_hash: String,
}

/// Response body for `POST /sync/commit`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// Whether the batch as a whole was accepted
    pub success: bool,
    /// Server timestamp of the commit
    pub synced_at: DateTime<Utc>,
    /// Files rejected by the expected-hash check; the client re-diffs only
    /// these, never the whole batch
    #[serde(default)]
    pub conflicts: Vec<CommitConflictDto>,
}

// ============================================================================
// Vectorize side channel and usage
// ============================================================================

/// Processing state of a file in the vectorization pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizeState {
    /// Embeddings are ready
    Vectorized,
    /// Queued, not yet started
    Pending,
    /// Currently being processed
    Processing,
    /// Processing failed
    Failed,
    /// The server does not know this file
    NotFound,
}

/// Storage/vectorization quota snapshot from `GET /usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Bytes of vault content stored
    pub storage_used_bytes: u64,
    /// Storage quota in bytes
    pub storage_limit_bytes: u64,
    /// Number of vectorized files
    pub vectorized_files: u64,
    /// Number of files stored
    pub file_count: u64,
    /// Maximum number of files allowed
    pub file_limit: u64,
}

/// The authenticated user, from `GET /user/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoDto {
    /// Stable account id
    pub id: String,
    /// Account email, if exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

// ============================================================================
// ISyncTransport trait
// ============================================================================

/// Port trait for the authenticated sync backend
///
/// One implementation speaks the HTTP contract; tests provide scripted
/// in-memory fakes. Uploads are content-addressed and therefore idempotent:
/// repeating one after a partial failure is always safe.
#[async_trait::async_trait]
pub trait ISyncTransport: Send + Sync {
    /// Computes the action list for the given inventory
    async fn diff(&self, request: &DiffRequest) -> Result<DiffResponse, SyncError>;

    /// Reports executed transfers and deletions; surfaces late conflicts
    async fn commit(&self, request: &CommitRequest) -> Result<CommitResponse, SyncError>;

    /// Fetches content from a server-issued transfer URL
    async fn download(&self, url: &str) -> Result<Vec<u8>, SyncError>;

    /// Pushes content to a server-issued transfer URL
    async fn upload(&self, url: &str, data: &[u8]) -> Result<(), SyncError>;

    /// Queues a synced file for vectorization
    async fn vectorize_file(&self, file_id: &str) -> Result<(), SyncError>;

    /// Removes a file from the vectorization index
    async fn remove_vectorized(&self, file_id: &str) -> Result<(), SyncError>;

    /// Polls the vectorization state of a file
    async fn vectorize_status(&self, file_id: &str) -> Result<VectorizeState, SyncError>;

    /// Fetches the storage/vectorization quota snapshot
    async fn get_usage(&self) -> Result<UsageSnapshot, SyncError>;

    /// Fetches the currently authenticated user
    async fn current_user(&self) -> Result<UserInfoDto, SyncError>;
}
