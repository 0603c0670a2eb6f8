//! Account-switch conflict detection and resolution
//!
//! When a vault comes online with credentials, the binding is checked
//! against the currently authenticated account. A mismatch blocks that
//! vault's sync pipeline and asks a human operator to choose between
//! staying offline and re-binding to the current account. The question is
//! keyed by a generated [`DecisionId`] in a pending-request table and
//! answered from outside via [`BindingResolver::resolve`]; an unanswered
//! request defaults to stay-offline after the configured timeout.
//!
//! The wait runs outside any per-round lock, so it blocks only the vault
//! it belongs to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use vaultsync_core::domain::binding::Binding;
use vaultsync_core::domain::newtypes::{DecisionId, UserId, VaultId};
use vaultsync_core::error::SyncError;
use vaultsync_core::ports::binding_store::IBindingStore;
use vaultsync_core::ports::sync_transport::ISyncTransport;

/// Operator's answer to a binding conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingDecision {
    /// Keep the binding as-is and do not sync
    StayOffline,
    /// Delete the old binding and sync against the current account
    ///
    /// Local files are untouched; only binding metadata changes. The next
    /// successful sync creates a fresh binding for the current user.
    SyncToCurrent,
}

/// Outcome of the pre-round binding check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCheck {
    /// Sync may proceed
    Proceed,
    /// The operator chose (or defaulted to) staying offline
    StayOffline,
}

/// A binding conflict awaiting a human decision, delivered to the UI layer
#[derive(Debug, Clone)]
pub struct BindingConflictRequest {
    /// Key for answering via [`BindingResolver::resolve`]
    pub decision_id: DecisionId,
    /// The vault's human-readable name
    pub vault_name: String,
    /// The account the vault is bound to
    pub bound_user: UserId,
    /// The account currently authenticated on this device
    pub current_user: UserId,
}

type DeliveryFn = dyn Fn(BindingConflictRequest) + Send + Sync;

/// Detects and resolves account-switch conflicts for one vault
pub struct BindingResolver {
    store: Arc<dyn IBindingStore>,
    transport: Arc<dyn ISyncTransport>,
    /// How long an unanswered request waits before defaulting
    decision_timeout: Duration,
    /// Pending requests keyed by decision id
    pending: Mutex<HashMap<DecisionId, oneshot::Sender<BindingDecision>>>,
    /// Callback delivering conflict requests to the UI layer
    delivery: Mutex<Option<Box<DeliveryFn>>>,
    /// Cached current-user id, cleared on logout
    cached_user: Mutex<Option<UserId>>,
}

impl BindingResolver {
    /// Creates a resolver over the given store and transport
    #[must_use]
    pub fn new(
        store: Arc<dyn IBindingStore>,
        transport: Arc<dyn ISyncTransport>,
        decision_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            transport,
            decision_timeout,
            pending: Mutex::new(HashMap::new()),
            delivery: Mutex::new(None),
            cached_user: Mutex::new(None),
        })
    }

    /// Registers the callback that delivers conflict requests to the UI
    pub fn set_delivery(&self, delivery: impl Fn(BindingConflictRequest) + Send + Sync + 'static) {
        *self.delivery.lock().expect("delivery lock poisoned") = Some(Box::new(delivery));
    }

    /// Returns the current account id, fetching and caching it on first use
    pub async fn current_user(&self) -> Result<UserId, SyncError> {
        if let Some(cached) = self.cached_user.lock().expect("user lock poisoned").clone() {
            return Ok(cached);
        }
        let info = self.transport.current_user().await?;
        let user = UserId::new(info.id)?;
        *self.cached_user.lock().expect("user lock poisoned") = Some(user.clone());
        Ok(user)
    }

    /// Checks the binding against the current account before a round
    ///
    /// - no binding → proceed (bindings are created after first sync)
    /// - legacy binding (no recorded user) → adopt the current user silently
    /// - matching user → proceed
    /// - mismatch → block on a human decision, defaulting to stay-offline
    pub async fn ensure_binding(&self, vault_name: &str) -> Result<BindingCheck, SyncError> {
        let current = self.current_user().await?;

        let Some(binding) = self.store.get().await? else {
            debug!("No binding yet; first sync will create one");
            return Ok(BindingCheck::Proceed);
        };

        if binding.is_legacy() {
            info!(user = %current, "Adopting legacy binding for current user");
            let mut adopted = binding;
            adopted.adopt_user(current);
            self.store.save(&adopted).await?;
            return Ok(BindingCheck::Proceed);
        }

        if binding.matches_user(&current) {
            return Ok(BindingCheck::Proceed);
        }

        let bound = binding
            .bound_user_id()
            .cloned()
            .unwrap_or_else(|| current.clone());
        info!(
            bound_user = %bound,
            current_user = %current,
            "Binding conflict: vault is bound to a different account"
        );

        match self.prompt(vault_name, bound, current).await {
            BindingDecision::StayOffline => Ok(BindingCheck::StayOffline),
            BindingDecision::SyncToCurrent => {
                self.store.delete().await?;
                info!("Old binding deleted; next successful sync will re-bind");
                Ok(BindingCheck::Proceed)
            }
        }
    }

    /// Answers a pending request; returns false if it already expired
    pub fn resolve(&self, decision_id: DecisionId, decision: BindingDecision) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&decision_id);
        match sender {
            Some(sender) => {
                debug!(%decision_id, ?decision, "Binding decision received");
                sender.send(decision).is_ok()
            }
            None => {
                warn!(%decision_id, "Decision for unknown or expired request");
                false
            }
        }
    }

    /// Cancels all pending requests with stay-offline and clears the
    /// cached current-user id (logout)
    pub fn logout(&self) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .drain()
            .collect();
        for (id, sender) in drained {
            debug!(decision_id = %id, "Cancelling pending binding request on logout");
            let _ = sender.send(BindingDecision::StayOffline);
        }
        *self.cached_user.lock().expect("user lock poisoned") = None;
    }

    /// Creates the binding after the first successful sync, if absent
    pub async fn record_successful_sync(
        &self,
        vault_id: &VaultId,
        vault_name: &str,
    ) -> Result<(), SyncError> {
        if self.store.get().await?.is_some() {
            return Ok(());
        }
        let user = self.current_user().await?;
        let binding = Binding::new(vault_id.clone(), vault_name, user);
        self.store.save(&binding).await?;
        info!(vault_id = %vault_id, "Binding created after first successful sync");
        Ok(())
    }

    /// Parks the caller on a fresh pending request until answered or timed out
    async fn prompt(
        &self,
        vault_name: &str,
        bound_user: UserId,
        current_user: UserId,
    ) -> BindingDecision {
        let decision_id = DecisionId::new();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .insert(decision_id, tx);

        let request = BindingConflictRequest {
            decision_id,
            vault_name: vault_name.to_string(),
            bound_user,
            current_user,
        };
        {
            let delivery = self.delivery.lock().expect("delivery lock poisoned");
            match delivery.as_ref() {
                Some(deliver) => deliver(request),
                None => warn!(%decision_id, "No UI registered for binding conflicts"),
            }
        }

        let decision = match tokio::time::timeout(self.decision_timeout, rx).await {
            Ok(Ok(decision)) => decision,
            // Timed out or the sender was dropped: default to stay-offline.
            _ => {
                info!(%decision_id, "Binding decision timed out, staying offline");
                BindingDecision::StayOffline
            }
        };
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&decision_id);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vaultsync_core::ports::sync_transport::{
        CommitRequest, CommitResponse, DiffRequest, DiffResponse, UsageSnapshot, UserInfoDto,
        VectorizeState,
    };

    /// Transport fake: only `current_user` matters here
    struct StubTransport {
        user: String,
        calls: AtomicUsize,
    }

    impl StubTransport {
        fn new(user: &str) -> Arc<Self> {
            Arc::new(Self {
                user: user.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl ISyncTransport for StubTransport {
        async fn diff(&self, _request: &DiffRequest) -> Result<DiffResponse, SyncError> {
            Ok(DiffResponse::default())
        }
        async fn commit(&self, _request: &CommitRequest) -> Result<CommitResponse, SyncError> {
            Err(SyncError::Network("not under test".into()))
        }
        async fn download(&self, _url: &str) -> Result<Vec<u8>, SyncError> {
            Ok(Vec::new())
        }
        async fn upload(&self, _url: &str, _data: &[u8]) -> Result<(), SyncError> {
            Ok(())
        }
        async fn vectorize_file(&self, _file_id: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn remove_vectorized(&self, _file_id: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn vectorize_status(&self, _file_id: &str) -> Result<VectorizeState, SyncError> {
            Ok(VectorizeState::NotFound)
        }
        async fn get_usage(&self) -> Result<UsageSnapshot, SyncError> {
            Err(SyncError::Network("not under test".into()))
        }
        async fn current_user(&self) -> Result<UserInfoDto, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UserInfoDto {
                id: self.user.clone(),
                email: None,
                display_name: None,
            })
        }
    }

    /// In-memory binding store fake
    struct MemoryBindingStore {
        binding: Mutex<Option<Binding>>,
    }

    impl MemoryBindingStore {
        fn new(initial: Option<Binding>) -> Arc<Self> {
            Arc::new(Self {
                binding: Mutex::new(initial),
            })
        }
    }

    #[async_trait::async_trait]
    impl IBindingStore for MemoryBindingStore {
        async fn get(&self) -> Result<Option<Binding>, SyncError> {
            Ok(self.binding.lock().unwrap().clone())
        }
        async fn save(&self, binding: &Binding) -> Result<(), SyncError> {
            *self.binding.lock().unwrap() = Some(binding.clone());
            Ok(())
        }
        async fn delete(&self) -> Result<bool, SyncError> {
            Ok(self.binding.lock().unwrap().take().is_some())
        }
    }

    fn bound_to(user: &str) -> Binding {
        Binding::new(
            VaultId::new("vault-1").unwrap(),
            "Notes",
            UserId::new(user).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_no_binding_proceeds_without_prompt() {
        let store = MemoryBindingStore::new(None);
        let resolver = BindingResolver::new(
            store,
            StubTransport::new("alice"),
            Duration::from_secs(60),
        );
        let prompts = Arc::new(AtomicUsize::new(0));
        let counter = prompts.clone();
        resolver.set_delivery(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::Proceed);
        assert_eq!(prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matching_user_never_prompts() {
        let store = MemoryBindingStore::new(Some(bound_to("alice")));
        let resolver = BindingResolver::new(
            store,
            StubTransport::new("alice"),
            Duration::from_secs(60),
        );
        let prompts = Arc::new(AtomicUsize::new(0));
        let counter = prompts.clone();
        resolver.set_delivery(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::Proceed);
        assert_eq!(prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_legacy_binding_adopted_silently() {
        let legacy: Binding =
            serde_json::from_str(r#"{"vaultId":"vault-1","vaultName":"Notes"}"#).unwrap();
        let store = MemoryBindingStore::new(Some(legacy));
        let resolver = BindingResolver::new(
            store.clone(),
            StubTransport::new("alice"),
            Duration::from_secs(60),
        );

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::Proceed);

        let saved = store.get().await.unwrap().unwrap();
        assert_eq!(
            saved.bound_user_id(),
            Some(&UserId::new("alice").unwrap())
        );
    }

    #[tokio::test]
    async fn test_mismatch_stay_offline_keeps_binding() {
        let store = MemoryBindingStore::new(Some(bound_to("alice")));
        let resolver = BindingResolver::new(
            store.clone(),
            StubTransport::new("bob"),
            Duration::from_secs(60),
        );
        let answer_with = resolver.clone();
        resolver.set_delivery(move |request| {
            assert_eq!(request.bound_user.as_str(), "alice");
            assert_eq!(request.current_user.as_str(), "bob");
            answer_with.resolve(request.decision_id, BindingDecision::StayOffline);
        });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::StayOffline);
        assert_eq!(store.get().await.unwrap(), Some(bound_to("alice")));
    }

    #[tokio::test]
    async fn test_mismatch_sync_to_current_deletes_binding() {
        let store = MemoryBindingStore::new(Some(bound_to("alice")));
        let resolver = BindingResolver::new(
            store.clone(),
            StubTransport::new("bob"),
            Duration::from_secs(60),
        );
        let answer_with = resolver.clone();
        resolver.set_delivery(move |request| {
            answer_with.resolve(request.decision_id, BindingDecision::SyncToCurrent);
        });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::Proceed);
        assert!(store.get().await.unwrap().is_none());

        // The next successful sync re-binds to the current account.
        resolver
            .record_successful_sync(&VaultId::new("vault-1").unwrap(), "Notes")
            .await
            .unwrap();
        let rebound = store.get().await.unwrap().unwrap();
        assert_eq!(rebound.bound_user_id(), Some(&UserId::new("bob").unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_defaults_after_timeout() {
        let store = MemoryBindingStore::new(Some(bound_to("alice")));
        let resolver = BindingResolver::new(
            store.clone(),
            StubTransport::new("bob"),
            Duration::from_secs(60),
        );
        resolver.set_delivery(|_| { /* operator never answers */ });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::StayOffline);
        assert_eq!(store.get().await.unwrap(), Some(bound_to("alice")));
    }

    #[tokio::test]
    async fn test_logout_cancels_pending_and_clears_cache() {
        let transport = StubTransport::new("bob");
        let store = MemoryBindingStore::new(Some(bound_to("alice")));
        let resolver = BindingResolver::new(store, transport.clone(), Duration::from_secs(60));

        let logout_from = resolver.clone();
        resolver.set_delivery(move |_| {
            logout_from.logout();
        });

        let check = resolver.ensure_binding("Notes").await.unwrap();
        assert_eq!(check, BindingCheck::StayOffline);

        // Cache was cleared, so the next check re-fetches the user.
        let before = transport.calls.load(Ordering::SeqCst);
        let _ = resolver.current_user().await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_false() {
        let resolver = BindingResolver::new(
            MemoryBindingStore::new(None),
            StubTransport::new("alice"),
            Duration::from_secs(60),
        );
        assert!(!resolver.resolve(DecisionId::new(), BindingDecision::StayOffline));
    }

    #[tokio::test]
    async fn test_current_user_cached() {
        let transport = StubTransport::new("alice");
        let resolver = BindingResolver::new(
            MemoryBindingStore::new(None),
            transport.clone(),
            Duration::from_secs(60),
        );
        let _ = resolver.current_user().await.unwrap();
        let _ = resolver.current_user().await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
