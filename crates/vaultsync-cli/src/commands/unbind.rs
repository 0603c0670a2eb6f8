//! Unbind command - delete the vault's account binding

use anyhow::Result;
use clap::Args;

use vaultsync_binding::JsonBindingStore;
use vaultsync_core::ports::binding_store::IBindingStore;

use crate::commands::load_config;
use crate::output::{get_formatter, OutputFormat};

/// Delete the vault's account binding
///
/// Local files are untouched; the next successful sync binds the vault to
/// the account that runs it.
#[derive(Debug, Args)]
pub struct UnbindCommand {}

impl UnbindCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let state_dir = config.state_dir()?;

        let store = JsonBindingStore::new(JsonBindingStore::record_path(
            &state_dir,
            &config.vault.path,
        ));
        if store.delete().await? {
            formatter.success("Binding deleted; the next sync will re-bind this vault");
        } else {
            formatter.info("No binding to delete");
        }
        Ok(())
    }
}
