//! Application configuration
//!
//! YAML configuration loaded from `$VAULTSYNC_CONFIG` or the platform
//! config directory (`~/.config/vaultsync/config.yaml` on Linux). Missing
//! files yield defaults; unknown fields are rejected so typos surface
//! early. The device id is generated once per installation and persisted
//! in the state directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::DeviceId;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "VAULTSYNC_CONFIG";

/// Environment variable supplying the API bearer token
pub const TOKEN_ENV_VAR: &str = "VAULTSYNC_TOKEN";

/// API endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the sync backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://api.vaultsync.dev/v1".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// The vault this installation synchronizes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Absolute path of the vault root on disk
    #[serde(default)]
    pub path: PathBuf,
    /// Human-readable vault name (defaults to the directory name)
    #[serde(default)]
    pub name: String,
    /// Server-assigned vault id
    #[serde(default)]
    pub id: String,
}

/// Sync behavior tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Quiet period after a change event before a round starts (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Periodic round interval when no events arrive (seconds, 0 disables)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Status broadcast throttle window (ms)
    #[serde(default = "default_broadcast_throttle_ms")]
    pub broadcast_throttle_ms: u64,
    /// How long to wait for a binding-conflict decision (seconds)
    #[serde(default = "default_binding_decision_timeout_secs")]
    pub binding_decision_timeout_secs: u64,
    /// Whether uploads are queued for vectorization after commit
    #[serde(default)]
    pub vectorize_enabled: bool,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_interval_secs() -> u64 {
    300
}

fn default_broadcast_throttle_ms() -> u64 {
    100
}

fn default_binding_decision_timeout_secs() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            interval_secs: default_interval_secs(),
            broadcast_throttle_ms: default_broadcast_throttle_ms(),
            binding_decision_timeout_secs: default_binding_decision_timeout_secs(),
            vectorize_enabled: false,
        }
    }
}

/// Root configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// API endpoint settings
    #[serde(default)]
    pub api: ApiConfig,
    /// The vault this installation synchronizes
    #[serde(default)]
    pub vault: VaultConfig,
    /// Sync behavior tuning
    #[serde(default)]
    pub sync: SyncConfig,
    /// Directory for index, binding, and device-id state
    /// (defaults to the platform data directory)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from the default location
    ///
    /// Resolution order: `$VAULTSYNC_CONFIG`, then the platform config
    /// directory. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            anyhow::bail!("api.base_url must be an http(s) URL: {}", self.api.base_url);
        }
        if self.sync.broadcast_throttle_ms == 0 {
            anyhow::bail!("sync.broadcast_throttle_ms must be positive");
        }
        Ok(())
    }

    /// Returns the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("vaultsync").join("config.yaml"))
    }

    /// Returns the state directory, creating it if necessary
    pub fn state_dir(&self) -> Result<PathBuf> {
        let dir = match &self.state_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .context("Could not determine data directory")?
                .join("vaultsync"),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads the persisted device id, generating and persisting one on
    /// first run
    pub fn device_id(&self) -> Result<DeviceId> {
        let path = self.state_dir()?.join("device_id");
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read device id: {}", path.display()))?;
            DeviceId::new(raw.trim()).context("Persisted device id is invalid")
        } else {
            let id = DeviceId::generate();
            std::fs::write(&path, id.as_str())
                .with_context(|| format!("Failed to persist device id: {}", path.display()))?;
            Ok(id)
        }
    }

    /// Returns the API bearer token from the environment
    pub fn api_token(&self) -> Result<String> {
        std::env::var(TOKEN_ENV_VAR)
            .with_context(|| format!("{TOKEN_ENV_VAR} is not set; authenticate first"))
    }
}
