//! Usage command - show the account's quota snapshot

use anyhow::Result;
use clap::Args;

use vaultsync_core::ports::sync_transport::ISyncTransport;

use crate::commands::{build_transport, load_config};
use crate::output::{get_formatter, OutputFormat};

/// Show storage and vectorization quota usage
#[derive(Debug, Args)]
pub struct UsageCommand {}

impl UsageCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let transport = build_transport(&config)?;

        let usage = transport.get_usage().await?;
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "storageUsedBytes": usage.storage_used_bytes,
                "storageLimitBytes": usage.storage_limit_bytes,
                "fileCount": usage.file_count,
                "fileLimit": usage.file_limit,
                "vectorizedFiles": usage.vectorized_files,
            }));
            return Ok(());
        }

        formatter.success(&format!(
            "Storage: {} / {}",
            human_bytes(usage.storage_used_bytes),
            human_bytes(usage.storage_limit_bytes)
        ));
        formatter.info(&format!(
            "Files: {} of {} ({} vectorized)",
            usage.file_count, usage.file_limit, usage.vectorized_files
        ));
        Ok(())
    }
}

/// Formats a byte count with a binary unit suffix
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
