//! Hub runtime configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};

/// Runtime settings shared by every tunnel of one hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Local service port substituted into `{port}`
    pub port: u16,

    /// Wait for the local port to accept connections before launching
    pub check_local_port: bool,

    /// How long the reporter waits for every tunnel to resolve (0 = forever)
    #[serde(with = "option_duration_secs")]
    pub timeout: Option<Duration>,

    /// Upper bound on the polling interval of condition waits
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Grace period between SIGTERM and a forced kill
    #[serde(with = "duration_secs")]
    pub grace_period: Duration,

    /// Print the result block once all tunnels resolve
    pub show_report: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: 7860,
            check_local_port: true,
            timeout: Some(Duration::from_secs(15)),
            poll_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
            show_report: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.port, 7860);
        assert!(config.check_local_port);
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert!(config.show_report);
    }
}
