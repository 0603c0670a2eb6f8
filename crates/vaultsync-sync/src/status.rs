//! Sync status state machine and throttled broadcast
//!
//! One [`SyncStateManager`] exists per vault, constructed once and passed by
//! reference wherever sync status is needed. All transitions are driven by
//! the engine; observers receive snapshots synchronously in registration
//! order, throttled to one broadcast per window with a guaranteed trailing
//! broadcast of the final state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use vaultsync_core::error::SyncError;

use crate::throttle::TrailingThrottle;

/// Lifecycle state of a vault's sync pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// No bound vault
    Disabled,
    /// Bound, no round in progress
    Idle,
    /// A round is in progress
    Syncing,
    /// The last round failed on a network-like error
    Offline,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineStatus::Disabled => "disabled",
            EngineStatus::Idle => "idle",
            EngineStatus::Syncing => "syncing",
            EngineStatus::Offline => "offline",
        };
        write!(f, "{name}")
    }
}

/// Point-in-time view of a vault's sync state
///
/// Recomputed from the manager's fields at every broadcast; never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    /// Current lifecycle state
    pub status: EngineStatus,
    /// Root of the bound vault
    pub vault_path: Option<PathBuf>,
    /// Server-assigned vault id
    pub vault_id: Option<String>,
    /// Actions outstanding in the current round
    pub pending_count: usize,
    /// Server timestamp of the last successful commit
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Latest error only, not a log
    pub error: Option<String>,
}

struct StatusFields {
    status: EngineStatus,
    vault_path: Option<PathBuf>,
    vault_id: Option<String>,
    pending_count: usize,
    last_sync_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl StatusFields {
    fn snapshot(&self) -> SyncStatusSnapshot {
        SyncStatusSnapshot {
            status: self.status,
            vault_path: self.vault_path.clone(),
            vault_id: self.vault_id.clone(),
            pending_count: self.pending_count,
            last_sync_at: self.last_sync_at,
            error: self.error.clone(),
        }
    }
}

type Observer = Box<dyn Fn(&SyncStatusSnapshot) + Send + Sync>;

struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

/// Handle returned at registration; unsubscribes the observer explicitly
pub struct SubscriptionHandle {
    id: u64,
    registry: Arc<Mutex<ObserverRegistry>>,
}

impl SubscriptionHandle {
    /// Removes the observer from the registry
    pub fn unsubscribe(self) {
        let mut registry = self.registry.lock().expect("observer lock poisoned");
        registry.observers.retain(|(id, _)| *id != self.id);
    }
}

/// Status state machine for a single vault
///
/// Every mutation broadcasts a fresh snapshot through the trailing-edge
/// throttle. Observers must not subscribe or unsubscribe from inside their
/// own callback.
pub struct SyncStateManager {
    fields: Mutex<StatusFields>,
    registry: Arc<Mutex<ObserverRegistry>>,
    throttle: TrailingThrottle<SyncStatusSnapshot>,
}

impl SyncStateManager {
    /// Creates a manager broadcasting at most once per throttle window
    #[must_use]
    pub fn new(throttle_window: Duration) -> Arc<Self> {
        let registry = Arc::new(Mutex::new(ObserverRegistry {
            next_id: 0,
            observers: Vec::new(),
        }));
        let fanout = Arc::clone(&registry);
        let throttle = TrailingThrottle::new(throttle_window, move |snapshot| {
            let registry = fanout.lock().expect("observer lock poisoned");
            for (_, observer) in &registry.observers {
                observer(&snapshot);
            }
        });

        Arc::new(Self {
            fields: Mutex::new(StatusFields {
                status: EngineStatus::Disabled,
                vault_path: None,
                vault_id: None,
                pending_count: 0,
                last_sync_at: None,
                error: None,
            }),
            registry,
            throttle,
        })
    }

    /// Registers an observer; fan-out follows registration order
    pub fn subscribe(
        &self,
        observer: impl Fn(&SyncStatusSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let mut registry = self.registry.lock().expect("observer lock poisoned");
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.push((id, Box::new(observer)));
        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Returns the current snapshot without broadcasting
    #[must_use]
    pub fn snapshot(&self) -> SyncStatusSnapshot {
        self.fields.lock().expect("status lock poisoned").snapshot()
    }

    /// Binds the manager to a vault, leaving the disabled state
    pub fn set_vault(&self, vault_path: PathBuf, vault_id: impl Into<String>) {
        self.mutate(|f| {
            f.vault_path = Some(vault_path);
            f.vault_id = Some(vault_id.into());
            if f.status == EngineStatus::Disabled {
                f.status = EngineStatus::Idle;
            }
        });
    }

    /// Marks a round as started
    pub fn round_started(&self) {
        debug!("Round started");
        self.mutate(|f| f.status = EngineStatus::Syncing);
    }

    /// Marks a round as completed successfully
    ///
    /// Clears the error and, when the round committed, records the server's
    /// commit timestamp.
    pub fn round_succeeded(&self, synced_at: Option<DateTime<Utc>>) {
        self.mutate(|f| {
            f.status = EngineStatus::Idle;
            f.pending_count = 0;
            f.error = None;
            if synced_at.is_some() {
                f.last_sync_at = synced_at;
            }
        });
    }

    /// Marks a round as failed
    ///
    /// Network-like failures go offline and self-heal on the next trigger;
    /// everything else returns to idle with the error recorded.
    pub fn round_failed(&self, error: &SyncError) {
        let status = if error.is_network_like() {
            EngineStatus::Offline
        } else {
            EngineStatus::Idle
        };
        info!(%error, ?status, "Round failed");
        let message = error.to_string();
        self.mutate(|f| {
            f.status = status;
            f.pending_count = 0;
            f.error = Some(message);
        });
    }

    /// Marks the pipeline as blocked by an unresolved account binding
    pub fn binding_blocked(&self) {
        self.mutate(|f| {
            f.status = EngineStatus::Offline;
            f.pending_count = 0;
            f.error = Some("vault is bound to a different account".to_string());
        });
    }

    /// Updates the number of actions outstanding in the current round
    pub fn set_pending(&self, count: usize) {
        self.mutate(|f| f.pending_count = count);
    }

    /// Clears all fields and cancels any pending broadcast timer
    ///
    /// Used on logout or vault switch.
    pub fn reset(&self) {
        info!("Sync state reset");
        self.throttle.cancel();
        let mut fields = self.fields.lock().expect("status lock poisoned");
        fields.status = EngineStatus::Disabled;
        fields.vault_path = None;
        fields.vault_id = None;
        fields.pending_count = 0;
        fields.last_sync_at = None;
        fields.error = None;
    }

    fn mutate(&self, apply: impl FnOnce(&mut StatusFields)) {
        let snapshot = {
            let mut fields = self.fields.lock().expect("status lock poisoned");
            apply(&mut fields);
            fields.snapshot()
        };
        self.throttle.publish(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(manager: &SyncStateManager) -> Arc<Mutex<Vec<SyncStatusSnapshot>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        // Handle leaked on purpose: the observer lives as long as the test.
        std::mem::forget(manager.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        }));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_disabled_and_binds_to_idle() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        assert_eq!(manager.snapshot().status, EngineStatus::Disabled);

        manager.set_vault(PathBuf::from("/vault"), "vault-1");
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Idle);
        assert_eq!(snapshot.vault_id.as_deref(), Some("vault-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_lifecycle_transitions() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        manager.set_vault(PathBuf::from("/vault"), "vault-1");

        manager.round_started();
        assert_eq!(manager.snapshot().status, EngineStatus::Syncing);

        let at = Utc::now();
        manager.round_succeeded(Some(at));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Idle);
        assert_eq!(snapshot.last_sync_at, Some(at));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_goes_offline() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        manager.set_vault(PathBuf::from("/vault"), "vault-1");
        manager.round_started();

        manager.round_failed(&SyncError::Network("unreachable".into()));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Offline);
        assert!(snapshot.error.unwrap().contains("unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_network_failure_stays_idle_with_error() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        manager.set_vault(PathBuf::from("/vault"), "vault-1");
        manager.round_started();

        manager.round_failed(&SyncError::QuotaExceeded("storage limit".into()));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Idle);
        assert!(snapshot.error.unwrap().contains("storage limit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_previous_error() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        manager.set_vault(PathBuf::from("/vault"), "vault-1");
        manager.round_failed(&SyncError::Network("down".into()));

        manager.round_succeeded(None);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Idle);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_broadcast_collapses_burst() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        let seen = observed(&manager);

        // 10 mutations inside 50 ms: at most 2 broadcasts, the last of
        // which carries the final state.
        for count in 0..10 {
            manager.set_pending(count);
            tokio::time::advance(Duration::from_millis(5)).await;
        }
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;

        let seen = seen.lock().unwrap();
        assert!(seen.len() <= 2, "got {} broadcasts", seen.len());
        assert_eq!(seen.last().unwrap().pending_count, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_fan_out_in_registration_order() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let sink = order.clone();
            std::mem::forget(manager.subscribe(move |_| {
                sink.lock().unwrap().push(label);
            }));
        }

        manager.set_pending(1);
        tokio::task::yield_now().await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let handle = manager.subscribe(move |_| {
            *sink.lock().unwrap() += 1;
        });

        manager.set_pending(1);
        tokio::task::yield_now().await;
        handle.unsubscribe();
        tokio::time::advance(Duration::from_millis(150)).await;
        manager.set_pending(2);
        tokio::task::yield_now().await;

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_fields_and_pending_broadcast() {
        let manager = SyncStateManager::new(Duration::from_millis(100));
        let seen = observed(&manager);

        manager.set_vault(PathBuf::from("/vault"), "vault-1");
        manager.set_pending(5);
        manager.reset();

        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, EngineStatus::Disabled);
        assert!(snapshot.vault_id.is_none());
        assert_eq!(snapshot.pending_count, 0);

        // The suppressed set_pending(5) broadcast never fires after reset.
        assert!(seen.lock().unwrap().iter().all(|s| s.pending_count != 5));
    }
}
