/// Configuration for the Turno document server.
/// Reads server.json from ~/.config/turno/server.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Where documents are persisted; `<config_dir>/turno/data` when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Collection holding the shift reports.
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_port() -> u16 {
    8090
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_collection() -> String {
    "informes_produccion".to_string()
}

fn turno_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turno")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            data_dir: None,
            collection: default_collection(),
        }
    }
}

impl ServerConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| turno_config_dir().join("data"))
    }
}

/// Default config path: ~/.config/turno/server.json
pub fn default_config_path() -> PathBuf {
    turno_config_dir().join("server.json")
}

/// Load config from path. Returns default if the file doesn't exist or
/// doesn't parse.
pub fn load_config(path: &Path) -> ServerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse config {}: {}", path.display(), e);
            ServerConfig::default()
        }),
        Err(_) => {
            log::info!("No config at {}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}
