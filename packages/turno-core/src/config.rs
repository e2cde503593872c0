/// Client-side configuration.
/// Reads client.json from ~/.config/turno/client.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and endpoint settings for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Quiet period after the last local edit before a push.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Safety push interval; 0 disables it.
    #[serde(default = "default_periodic_push_secs")]
    pub periodic_push_secs: u64,
    /// Base URL of the remote document store.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_periodic_push_secs() -> u64 {
    120
}

fn default_remote_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            periodic_push_secs: default_periodic_push_secs(),
            remote_url: default_remote_url(),
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn periodic_push(&self) -> Option<Duration> {
        (self.periodic_push_secs > 0).then(|| Duration::from_secs(self.periodic_push_secs))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub sync: SyncSettings,
    /// Path of the file-backed local store; platform data dir when unset.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Where the local store lives: `storage_path`, or the platform default.
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(crate::storage::file::FileStore::default_path)
    }
}

/// Default config path: ~/.config/turno/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turno")
        .join("client.json")
}

/// Load config from path. Returns default if the file is missing or malformed.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[turno.config] Failed to parse config {}: {}", path.display(), e);
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!("[turno.config] No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}
