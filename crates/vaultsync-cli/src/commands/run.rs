//! Run command - keep the vault synchronized until interrupted

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use vaultsync_sync::SyncScheduler;

use crate::commands::{build_engine, load_config};
use crate::output::{get_formatter, OutputFormat};

/// Sync continuously on the configured interval until Ctrl-C
#[derive(Debug, Args)]
pub struct RunCommand {}

impl RunCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let engine = build_engine(&config).await?;

        std::mem::forget(engine.status().subscribe(|snapshot| {
            info!(
                status = %snapshot.status,
                pending = snapshot.pending_count,
                "Status changed"
            );
        }));

        // The change channel is the intake for an external watcher process;
        // held open here so the scheduler keeps running on its interval.
        let (change_tx, change_rx) = mpsc::channel(256);
        let (mut scheduler, request) = SyncScheduler::new(
            engine,
            change_rx,
            Duration::from_millis(config.sync.debounce_ms),
            Duration::from_secs(config.sync.interval_secs),
        );
        // First round immediately; the interval covers the rest.
        request.request_sync();

        formatter.success(&format!(
            "Syncing {} every {}s (Ctrl-C to stop)",
            config.vault.path.display(),
            config.sync.interval_secs
        ));

        tokio::select! {
            _ = scheduler.run() => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupted, shutting down");
            }
        }
        drop(change_tx);
        Ok(())
    }
}
