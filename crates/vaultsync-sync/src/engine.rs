//! Diff/commit sync engine
//!
//! The [`SyncEngine`] runs one round per trigger: binding check, local
//! inventory, diff, ordered action execution, commit, baseline advance.
//!
//! ## Round Flow
//!
//! 1. **Binding check**: account mismatch blocks the round (stay-offline)
//! 2. **Inventory**: hash every live indexed file, snapshot local tombstones
//! 3. **Diff**: send the inventory, receive an ordered action list
//! 4. **Execute**: uploads, downloads, deletes, conflict resolution
//! 5. **Commit**: report executed transfers with expected-hash markers
//! 6. **Advance**: move index baselines to exactly the committed values
//!
//! ## Concurrency
//!
//! Exactly one round runs per vault at a time. A trigger arriving mid-round
//! is coalesced into one more round after the current one finishes, never a
//! parallel round. The index lock is held for the whole round, so watcher
//! bookkeeping applied through [`apply_events`](SyncEngine::apply_events)
//! waits for the round's own index calls to finish.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vaultsync_binding::{BindingCheck, BindingResolver};
use vaultsync_core::domain::clock::VectorClock;
use vaultsync_core::domain::file_entry::FileEntry;
use vaultsync_core::domain::newtypes::{ContentHash, DeviceId, FileId, VaultId, VaultPath};
use vaultsync_core::error::SyncError;
use vaultsync_core::ports::local_vault::{ChangeEvent, ILocalVault};
use vaultsync_core::ports::sync_transport::{
    CommitRequest, CompletedFileDto, DiffRequest, ISyncTransport, LocalFileDto, SyncActionDto,
    SyncActionKind,
};
use vaultsync_index::{FileIndex, SyncedRemoteFile};

use crate::status::SyncStateManager;

/// Counts of work performed by one completed round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Files pushed to the server
    pub uploaded: u32,
    /// Files fetched and adopted locally
    pub downloaded: u32,
    /// Files deleted (either side)
    pub deleted: u32,
    /// Concurrent edits resolved this round
    pub conflicts: u32,
    /// Files rejected at commit time, re-offered next round
    pub requeued: u32,
    /// Actions skipped on per-file errors
    pub skipped: u32,
    /// Server timestamp of the commit, if the round committed anything
    pub synced_at: Option<DateTime<Utc>>,
}

/// How a call to [`SyncEngine::sync`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A round ran to completion
    Completed(RoundSummary),
    /// A round was already in flight; one more will run after it
    Coalesced,
    /// The binding check chose stay-offline; nothing transferred
    BindingBlocked,
}

#[derive(Default)]
struct FlightState {
    running: bool,
    pending: bool,
}

/// Side effects accumulated while executing a round's action list
///
/// Index baselines only advance after the commit succeeds, so effects are
/// staged here first. A transport failure before commit leaves the index
/// untouched and every file re-offers next round; uploads are
/// content-addressed and idempotent to repeat.
#[derive(Default)]
struct RoundEffects {
    /// Executed transfers reported at commit time
    completed: Vec<CompletedFileDto>,
    /// Locally deleted file ids whose tombstone clocks dominate
    deleted: Vec<String>,
    /// Baseline advances for pushed content: (committed id, local id, hash, clock)
    baseline: Vec<(String, FileId, ContentHash, VectorClock)>,
    /// Server-confirmed downloads, adopted wholesale after commit
    confirmed: Vec<SyncedRemoteFile>,
    /// File ids to submit to the vectorize side channel
    uploaded_ids: Vec<String>,
    /// File ids to drop from the vectorize index
    removed_ids: Vec<String>,
}

/// Orchestrates diff/commit rounds for one vault
pub struct SyncEngine {
    vault_id: VaultId,
    vault_name: String,
    device_id: DeviceId,
    vectorize_enabled: bool,
    transport: Arc<dyn ISyncTransport>,
    vault: Arc<dyn ILocalVault>,
    /// Held for the whole round; serializes rounds against event bookkeeping
    index: Mutex<FileIndex>,
    /// Local deletions awaiting resolution against the server's copy
    tombstones: Mutex<Vec<FileEntry>>,
    resolver: Arc<BindingResolver>,
    status: Arc<SyncStateManager>,
    flight: StdMutex<FlightState>,
}

impl SyncEngine {
    /// Creates an engine for one vault and binds the status manager to it
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vault_id: VaultId,
        vault_name: impl Into<String>,
        vault_path: PathBuf,
        device_id: DeviceId,
        vectorize_enabled: bool,
        transport: Arc<dyn ISyncTransport>,
        vault: Arc<dyn ILocalVault>,
        index: FileIndex,
        resolver: Arc<BindingResolver>,
        status: Arc<SyncStateManager>,
    ) -> Arc<Self> {
        status.set_vault(vault_path, vault_id.to_string());
        Arc::new(Self {
            vault_id,
            vault_name: vault_name.into(),
            device_id,
            vectorize_enabled,
            transport,
            vault,
            index: Mutex::new(index),
            tombstones: Mutex::new(Vec::new()),
            resolver,
            status,
            flight: StdMutex::new(FlightState::default()),
        })
    }

    /// Returns the status manager driving this engine's broadcasts
    #[must_use]
    pub fn status(&self) -> &Arc<SyncStateManager> {
        &self.status
    }

    /// Applies watcher events to the index between rounds
    ///
    /// Blocks while a round holds the index, so an event arriving mid-round
    /// is applied only after the round's own index calls finish. Deletions
    /// become tombstones resolved by clock dominance in the next round.
    pub async fn apply_events(&self, events: Vec<ChangeEvent>) -> Result<(), SyncError> {
        let mut index = self.index.lock().await;
        for event in events {
            match event {
                ChangeEvent::Added(path) | ChangeEvent::Changed(path) => {
                    index.record_local_edit(&path).await?;
                }
                ChangeEvent::Removed(path) => {
                    if let Some(tombstone) = index.remove(&path).await? {
                        self.tombstones.lock().await.push(tombstone);
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs one sync round, coalescing concurrent triggers
    ///
    /// A trigger while a round is in flight returns immediately and the
    /// in-flight caller runs one more round before releasing the slot.
    pub async fn sync(&self) -> Result<RoundOutcome, SyncError> {
        {
            let mut flight = self.flight.lock().expect("flight lock poisoned");
            if flight.running {
                debug!("Round in flight, coalescing trigger");
                flight.pending = true;
                return Ok(RoundOutcome::Coalesced);
            }
            flight.running = true;
        }

        loop {
            self.status.round_started();
            let result = self.run_round().await;

            match &result {
                Ok(RoundOutcome::Completed(summary)) => {
                    info!(
                        uploaded = summary.uploaded,
                        downloaded = summary.downloaded,
                        deleted = summary.deleted,
                        conflicts = summary.conflicts,
                        requeued = summary.requeued,
                        "Round completed"
                    );
                    self.status.round_succeeded(summary.synced_at);
                }
                Ok(RoundOutcome::BindingBlocked) => {
                    info!("Round blocked: vault bound to a different account");
                    self.status.binding_blocked();
                }
                Ok(RoundOutcome::Coalesced) => unreachable!("run_round never coalesces"),
                Err(err) => self.status.round_failed(err),
            }

            let rerun = {
                let mut flight = self.flight.lock().expect("flight lock poisoned");
                if flight.pending {
                    flight.pending = false;
                    true
                } else {
                    flight.running = false;
                    false
                }
            };
            if !rerun {
                return result;
            }
            debug!("Running coalesced follow-up round");
        }
    }

    async fn run_round(&self) -> Result<RoundOutcome, SyncError> {
        match self.resolver.ensure_binding(&self.vault_name).await? {
            BindingCheck::Proceed => {}
            BindingCheck::StayOffline => return Ok(RoundOutcome::BindingBlocked),
        }

        let mut index = self.index.lock().await;
        let tombstones = self.tombstones.lock().await.clone();

        let inventory = self.build_inventory(&index).await?;
        debug!(
            files = inventory.len(),
            tombstones = tombstones.len(),
            "Requesting diff"
        );
        let request = DiffRequest {
            vault_id: self.vault_id.to_string(),
            device_id: self.device_id.to_string(),
            local_files: inventory,
        };
        let response = self.transport.diff(&request).await?;

        let total = response.actions.len();
        self.status.set_pending(total);

        let mut effects = RoundEffects::default();
        let mut summary = RoundSummary::default();
        for (done, action) in response.actions.iter().enumerate() {
            let result = self
                .execute_action(&mut index, &tombstones, action, &mut effects, &mut summary)
                .await;
            if let Err(err) = result {
                if err.is_network_like() || err.requires_user_action() {
                    return Err(err);
                }
                // Per-file failure: skip this action, round continues.
                warn!(path = %action.path, %err, "Action failed, skipping file");
                summary.skipped += 1;
            }
            self.status.set_pending(total - done - 1);
        }

        self.commit_and_advance(&mut index, effects, &mut summary)
            .await?;
        self.tombstones.lock().await.clear();

        // First successful round binds the vault to the current account.
        self.resolver
            .record_successful_sync(&self.vault_id, &self.vault_name)
            .await?;

        Ok(RoundOutcome::Completed(summary))
    }

    /// Hashes every live indexed file into the diff inventory
    ///
    /// A file deleted between the watcher event and the round is simply
    /// left out; the server then treats it as remote-only.
    async fn build_inventory(&self, index: &FileIndex) -> Result<Vec<LocalFileDto>, SyncError> {
        let mut inventory = Vec::with_capacity(index.len());
        for entry in index.live_entries() {
            match self.vault.hash(entry.path()).await {
                Ok(hash) => inventory.push(LocalFileDto {
                    path: entry.path().to_string(),
                    content_hash: hash.to_string(),
                    vector_clock: entry.vector_clock().clone(),
                }),
                Err(SyncError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %entry.path(), "Indexed file missing on disk, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(inventory)
    }

    async fn execute_action(
        &self,
        index: &mut FileIndex,
        tombstones: &[FileEntry],
        action: &SyncActionDto,
        effects: &mut RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        match action.action {
            SyncActionKind::Upload => self.run_upload(index, action, effects, summary).await,
            SyncActionKind::Download => {
                self.run_download(tombstones, action, effects, summary).await
            }
            SyncActionKind::Delete => self.run_delete(index, action, effects, summary).await,
            SyncActionKind::Conflict => self.run_conflict(index, action, effects, summary).await,
        }
    }

    /// Pushes local content; the index baseline advances after commit
    async fn run_upload(
        &self,
        index: &mut FileIndex,
        action: &SyncActionDto,
        effects: &mut RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        let path = VaultPath::new(action.path.as_str())?;
        let url = required(&action.upload_url, "upload URL", &path)?;

        let data = self.vault.read(&path).await?;
        self.transport.upload(url, &data).await?;

        let entry = index.get_or_create(&path).await?;
        let committed_id = action
            .file_id
            .clone()
            .unwrap_or_else(|| entry.file_id().to_string());
        let hash = ContentHash::of(&data);
        debug!(path = %path, file_id = %committed_id, "Uploaded");

        effects.completed.push(CompletedFileDto {
            file_id: committed_id.clone(),
            action: SyncActionKind::Upload,
            path: path.to_string(),
            content_hash: hash.to_string(),
            vector_clock: entry.vector_clock().clone(),
            expected_hash: entry.last_synced_hash().map(ToString::to_string),
        });
        effects.baseline.push((
            committed_id.clone(),
            entry.file_id().clone(),
            hash,
            entry.vector_clock().clone(),
        ));
        effects.uploaded_ids.push(committed_id);
        summary.uploaded += 1;
        Ok(())
    }

    /// Fetches remote content, unless a local tombstone dominates it
    ///
    /// A locally deleted file is absent from the inventory, so the server
    /// offers it back as a download. The tombstone's clock decides: if the
    /// deletion causally contains the remote edit, the delete proceeds;
    /// otherwise the remote edit wins and the file is restored.
    async fn run_download(
        &self,
        tombstones: &[FileEntry],
        action: &SyncActionDto,
        effects: &mut RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        let path = VaultPath::new(action.path.as_str())?;
        let remote_clock = action.remote_vector_clock.clone().unwrap_or_default();

        if let Some(tombstone) = tombstones.iter().find(|t| t.path() == &path) {
            if tombstone.vector_clock().dominates(&remote_clock) {
                info!(path = %path, "Local deletion dominates remote copy");
                effects.deleted.push(tombstone.file_id().to_string());
                effects.removed_ids.push(
                    action
                        .file_id
                        .clone()
                        .unwrap_or_else(|| tombstone.file_id().to_string()),
                );
                summary.deleted += 1;
                return Ok(());
            }
            info!(path = %path, "Remote edit supersedes local deletion, restoring");
        }

        let url = required(&action.download_url, "download URL", &path)?;
        let file_id = action
            .file_id
            .as_deref()
            .ok_or_else(|| SyncError::Index(format!("download action without file id: {path}")))?;

        let data = self.transport.download(url).await?;
        self.vault.write(&path, &data).await?;
        let hash = ContentHash::of(&data);
        debug!(path = %path, file_id, bytes = data.len(), "Downloaded");

        effects.completed.push(CompletedFileDto {
            file_id: file_id.to_string(),
            action: SyncActionKind::Download,
            path: path.to_string(),
            content_hash: hash.to_string(),
            vector_clock: remote_clock.clone(),
            expected_hash: None,
        });
        effects.confirmed.push(SyncedRemoteFile {
            file_id: FileId::new(file_id)?,
            path,
            vector_clock: remote_clock,
            content_hash: hash,
        });
        summary.downloaded += 1;
        Ok(())
    }

    /// Applies a server-side deletion locally, without a clock bump
    async fn run_delete(
        &self,
        index: &mut FileIndex,
        action: &SyncActionDto,
        effects: &mut RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        let path = VaultPath::new(action.path.as_str())?;
        self.vault.remove(&path).await?;
        if let Some(entry) = index.forget(&path).await? {
            effects.removed_ids.push(entry.file_id().to_string());
        }
        info!(path = %path, "Applied remote deletion");
        summary.deleted += 1;
        Ok(())
    }

    /// Resolves a concurrent edit deterministically
    ///
    /// Local content wins at the canonical path; the remote edit is
    /// preserved as a renamed sibling copy. Both sides adopt
    /// `merge(local, remote)` plus one local increment, so repeated rounds
    /// on any device converge to the same result. If a leg fails partway,
    /// only finished legs are committed and the rest re-surfaces as an
    /// incomplete diff next round.
    async fn run_conflict(
        &self,
        index: &mut FileIndex,
        action: &SyncActionDto,
        effects: &mut RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        let path = VaultPath::new(action.path.as_str())?;
        let sibling = VaultPath::new(
            required(&action.conflict_rename, "conflict rename", &path)?.as_str(),
        )?;
        let download_url = required(&action.download_url, "download URL", &path)?.clone();
        let canonical_url = required(&action.upload_url, "upload URL", &path)?.clone();
        let copy_url =
            required(&action.conflict_copy_upload_url, "conflict copy URL", &path)?.clone();
        let copy_id = required(&action.conflict_copy_id, "conflict copy id", &path)?.clone();

        let local = self.vault.read(&path).await?;
        let remote = self.transport.download(&download_url).await?;

        let entry = index.get_or_create(&path).await?;
        let remote_clock = action.remote_vector_clock.clone().unwrap_or_default();
        let merged = entry
            .vector_clock()
            .merge(&remote_clock)
            .incremented(&self.device_id);
        info!(path = %path, sibling = %sibling, "Resolving concurrent edit");

        // Preserve the remote edit as the renamed sibling.
        self.vault.write(&sibling, &remote).await?;
        self.transport.upload(&copy_url, &remote).await?;
        let remote_hash = ContentHash::of(&remote);
        effects.completed.push(CompletedFileDto {
            file_id: copy_id.clone(),
            action: SyncActionKind::Upload,
            path: sibling.to_string(),
            content_hash: remote_hash.to_string(),
            vector_clock: merged.clone(),
            expected_hash: None,
        });
        effects.confirmed.push(SyncedRemoteFile {
            file_id: FileId::new(copy_id.as_str())?,
            path: sibling,
            vector_clock: merged.clone(),
            content_hash: remote_hash.clone(),
        });

        // Local content wins at the canonical path. The server currently
        // holds the remote edit, so that hash is the expected one.
        self.transport.upload(&canonical_url, &local).await?;
        let local_hash = ContentHash::of(&local);
        let committed_id = action
            .file_id
            .clone()
            .unwrap_or_else(|| entry.file_id().to_string());
        effects.completed.push(CompletedFileDto {
            file_id: committed_id.clone(),
            action: SyncActionKind::Conflict,
            path: path.to_string(),
            content_hash: local_hash.to_string(),
            vector_clock: merged.clone(),
            expected_hash: Some(remote_hash.to_string()),
        });
        effects.baseline.push((
            committed_id.clone(),
            entry.file_id().clone(),
            local_hash,
            merged,
        ));
        effects.uploaded_ids.push(committed_id);
        effects.uploaded_ids.push(copy_id);
        summary.conflicts += 1;
        Ok(())
    }

    /// Commits executed work and advances index baselines
    ///
    /// Files rejected by the expected-hash check are left unadvanced so
    /// they re-offer next round; the batch itself is never aborted.
    async fn commit_and_advance(
        &self,
        index: &mut FileIndex,
        effects: RoundEffects,
        summary: &mut RoundSummary,
    ) -> Result<(), SyncError> {
        if effects.completed.is_empty() && effects.deleted.is_empty() {
            debug!("Nothing to commit");
            return Ok(());
        }

        let request = CommitRequest {
            vault_id: self.vault_id.to_string(),
            device_id: self.device_id.to_string(),
            completed: effects.completed,
            deleted: effects.deleted,
            vectorize_enabled: Some(self.vectorize_enabled),
        };
        let response = self.transport.commit(&request).await?;
        summary.synced_at = Some(response.synced_at);

        let rejected: HashSet<&str> = response
            .conflicts
            .iter()
            .map(|c| c.file_id.as_str())
            .collect();
        for conflict in &response.conflicts {
            warn!(
                path = %conflict.path,
                expected = %conflict.expected_hash,
                current = %conflict.current_hash,
                "Commit rejected by expected-hash check, file re-queues"
            );
        }
        summary.requeued = rejected.len() as u32;

        for (committed_id, local_id, hash, clock) in effects.baseline {
            if rejected.contains(committed_id.as_str()) {
                continue;
            }
            index.mark_synced(&local_id, hash, clock).await?;
        }
        let confirmed: Vec<SyncedRemoteFile> = effects
            .confirmed
            .into_iter()
            .filter(|f| !rejected.contains(f.file_id.as_str()))
            .collect();
        index.set_many(confirmed).await?;

        self.vectorize(&effects.uploaded_ids, &effects.removed_ids, &rejected)
            .await;
        Ok(())
    }

    /// Submits synced uploads to the vectorize side channel
    ///
    /// Best-effort: a quota error pauses only vectorization, never the
    /// round that already committed.
    async fn vectorize(
        &self,
        uploaded_ids: &[String],
        removed_ids: &[String],
        rejected: &HashSet<&str>,
    ) {
        if self.vectorize_enabled {
            for file_id in uploaded_ids {
                if rejected.contains(file_id.as_str()) {
                    continue;
                }
                match self.transport.vectorize_file(file_id).await {
                    Ok(()) => debug!(%file_id, "Queued for vectorization"),
                    Err(SyncError::QuotaExceeded(message)) => {
                        warn!(%file_id, %message, "Vectorize quota exhausted, pausing");
                        break;
                    }
                    Err(err) => warn!(%file_id, %err, "Vectorize submission failed"),
                }
            }
        }
        for file_id in removed_ids {
            if let Err(err) = self.transport.remove_vectorized(file_id).await {
                warn!(%file_id, %err, "Failed to drop vectorized entry");
            }
        }
    }
}

fn required<'a>(
    field: &'a Option<String>,
    name: &str,
    path: &VaultPath,
) -> Result<&'a String, SyncError> {
    field
        .as_ref()
        .ok_or_else(|| SyncError::Index(format!("action for {path} is missing its {name}")))
}
