//! CLI commands and shared wiring

pub mod run;
pub mod status;
pub mod sync;
pub mod unbind;
pub mod usage;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use vaultsync_api::{ApiClient, HttpSyncTransport};
use vaultsync_binding::{BindingResolver, JsonBindingStore};
use vaultsync_core::config::Config;
use vaultsync_core::domain::newtypes::VaultId;
use vaultsync_index::{FileIndex, JsonIndexStore};
use vaultsync_sync::{SyncEngine, SyncStateManager, TokioLocalVault};

/// Loads configuration from the file given on the command line, or the
/// default location
pub fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(std::path::Path::new(path)),
        None => Config::load(),
    }
}

/// Builds the authenticated transport from config and the token env var
pub fn build_transport(config: &Config) -> Result<Arc<HttpSyncTransport>> {
    let token = config.api_token()?;
    Ok(Arc::new(HttpSyncTransport::new(ApiClient::new(
        config.api.base_url.clone(),
        token,
    ))))
}

/// Derives the index snapshot path for the configured vault
pub fn index_path(config: &Config) -> Result<PathBuf> {
    let state_dir = config.state_dir()?;
    // Reuse the binding store's flattening so both records key the same way.
    let record = JsonBindingStore::record_path(&state_dir, &config.vault.path);
    let name = record
        .file_name()
        .context("vault path flattens to an empty record name")?
        .to_owned();
    Ok(state_dir.join("index").join(name))
}

/// Wires every adapter into a ready sync engine for the configured vault
pub async fn build_engine(config: &Config) -> Result<Arc<SyncEngine>> {
    anyhow::ensure!(
        !config.vault.id.is_empty(),
        "vault.id is not configured; set it in the config file"
    );
    anyhow::ensure!(
        config.vault.path.is_absolute(),
        "vault.path must be an absolute directory path"
    );

    let vault_id = VaultId::new(config.vault.id.clone())?;
    let vault_name = if config.vault.name.is_empty() {
        config
            .vault
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string())
    } else {
        config.vault.name.clone()
    };
    let device_id = config.device_id()?;
    let state_dir = config.state_dir()?;

    let transport = build_transport(config)?;
    let vault = TokioLocalVault::new(config.vault.path.clone());
    let index_store = JsonIndexStore::new(index_path(config)?);
    let index = FileIndex::load(index_store, device_id.clone())
        .await
        .context("Failed to load the file index")?;
    let binding_store = JsonBindingStore::new(JsonBindingStore::record_path(
        &state_dir,
        &config.vault.path,
    ));
    let resolver = BindingResolver::new(
        binding_store,
        transport.clone(),
        Duration::from_secs(config.sync.binding_decision_timeout_secs),
    );
    let status = SyncStateManager::new(Duration::from_millis(config.sync.broadcast_throttle_ms));

    Ok(SyncEngine::new(
        vault_id,
        vault_name,
        config.vault.path.clone(),
        device_id,
        config.sync.vectorize_enabled,
        transport,
        vault,
        index,
        resolver,
        status,
    ))
}
