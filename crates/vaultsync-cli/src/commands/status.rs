//! Status command - show vault, binding, and index state

use anyhow::Result;
use clap::Args;

use vaultsync_core::ports::binding_store::IBindingStore;
use vaultsync_core::ports::index_store::IIndexStore;
use vaultsync_binding::JsonBindingStore;
use vaultsync_index::JsonIndexStore;

use crate::commands::{index_path, load_config};
use crate::output::{get_formatter, OutputFormat};

/// Show the configured vault's persisted sync state
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let state_dir = config.state_dir()?;

        let binding = JsonBindingStore::new(JsonBindingStore::record_path(
            &state_dir,
            &config.vault.path,
        ))
        .get()
        .await?;

        let snapshot = JsonIndexStore::new(index_path(&config)?).load().await?;
        let (indexed, never_synced) = snapshot
            .as_ref()
            .map(|s| {
                let pending = s.files.iter().filter(|f| f.never_synced()).count();
                (s.files.len(), pending)
            })
            .unwrap_or((0, 0));

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "vaultPath": config.vault.path,
                "vaultId": config.vault.id,
                "boundUser": binding.as_ref().and_then(|b| b.bound_user_id()).map(ToString::to_string),
                "indexedFiles": indexed,
                "neverSynced": never_synced,
            }));
            return Ok(());
        }

        formatter.success(&format!("Vault: {}", config.vault.path.display()));
        match &binding {
            Some(binding) => match binding.bound_user_id() {
                Some(user) => formatter.info(&format!("Bound to account: {user}")),
                None => formatter.info("Bound (legacy record, no account recorded)"),
            },
            None => formatter.info("Not yet bound; first sync will bind it"),
        }
        formatter.info(&format!(
            "{indexed} indexed file(s), {never_synced} never synced"
        ));
        Ok(())
    }
}
