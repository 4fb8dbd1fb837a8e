//! Tunnel entries of the configuration file

use serde::{Deserialize, Serialize};

/// One `[[tunnel]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Display name
    pub name: String,

    /// Command template; `{port}` is replaced with the hub port
    pub command: String,

    /// Regular expression locating the URL in a line of output
    pub pattern: String,

    /// Note printed next to the URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Overrides `hub.check_local_port` for this tunnel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_local_port: Option<bool>,
}
