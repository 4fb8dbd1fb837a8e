//! Configuration management for TunnelHub

mod hub;
mod log;
pub mod serde_utils;
mod tunnel;

pub use hub::HubConfig;
pub use log::LogConfig;
pub use tunnel::TunnelConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunnelhub")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// On-disk configuration: hub settings, logging and the tunnels to launch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Hub runtime settings
    pub hub: HubConfig,

    /// Logging settings
    pub log: LogConfig,

    /// Tunnels, in registration order
    #[serde(rename = "tunnel")]
    pub tunnels: Vec<TunnelConfig>,
}

impl ConfigFile {
    /// A starter configuration with the common quick-tunnel clients
    pub fn sample() -> Self {
        Self {
            tunnels: vec![
                TunnelConfig {
                    name: "Cloudflared".to_string(),
                    command: "cloudflared tunnel --url localhost:{port}".to_string(),
                    pattern: r"[\w-]+\.trycloudflare\.com".to_string(),
                    note: None,
                    check_local_port: None,
                },
                TunnelConfig {
                    name: "Zrok".to_string(),
                    command: "zrok share public http://localhost:{port} --headless".to_string(),
                    pattern: r"[\w-]+\.share\.zrok\.io".to_string(),
                    note: None,
                    check_local_port: None,
                },
            ],
            ..Default::default()
        }
    }
}
