//! Core error types for TunnelHub

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type returned at the hub's API boundary
#[derive(Error, Debug)]
pub enum HubError {
    /// `start` was called while tunnels are running or being stopped
    #[error("Tunnel hub is already running")]
    AlreadyRunning,

    /// `stop` was called while the hub is idle or already stopping
    #[error("Tunnel hub is not running")]
    NotRunning,

    /// `start` was called with nothing registered
    #[error("No tunnels added")]
    NoTunnels,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The tunnel's match pattern does not compile
    #[error("Invalid pattern for tunnel {name}: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// The tunnel's command template cannot be split into arguments
    #[error("Invalid command for tunnel {name}: {reason}")]
    InvalidCommand { name: String, reason: String },

    /// Unknown log level name
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Runtime failures of a single tunnel's monitor.
///
/// These never cross the hub boundary: the monitor logs them with the
/// tunnel's name and exits without affecting its siblings.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Command template rendered to nothing
    #[error("Tunnel {0} has an empty command")]
    EmptyCommand(String),

    /// The command could not be rendered into argv
    #[error(transparent)]
    Command(#[from] ConfigError),

    /// Process launch failed
    #[error("Failed to launch {command} for tunnel {name}: {source}")]
    Spawn {
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the process output failed
    #[error("Failed to read output of tunnel {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
