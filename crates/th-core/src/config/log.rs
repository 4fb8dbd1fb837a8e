//! Logging configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

use crate::error::ConfigError;

/// Options for the console and file log sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Emit log lines on stderr
    pub console: bool,

    /// Colorize console output and the result block
    pub color: bool,

    /// Directory for the run log and per-tunnel logs; no files when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Minimum console level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console: true,
            color: true,
            dir: Some(default_log_dir()),
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// No console, no files
    pub fn silent() -> Self {
        Self {
            console: false,
            color: false,
            dir: None,
            level: "info".to_string(),
        }
    }

    /// Parsed minimum level
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))
    }
}

/// `~/tunnel_logs`, falling back to the working directory
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunnel_logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let mut config = LogConfig::silent();
        assert_eq!(config.level_filter().unwrap(), LevelFilter::INFO);

        config.level = "debug".to_string();
        assert_eq!(config.level_filter().unwrap(), LevelFilter::DEBUG);

        config.level = "loud".to_string();
        assert!(matches!(
            config.level_filter(),
            Err(ConfigError::InvalidLogLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_default_dir() {
        let config = LogConfig::default();
        assert!(config.dir.unwrap().ends_with("tunnel_logs"));
    }
}
