//! Core domain types

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::TunnelConfig;
use crate::error::ConfigError;

/// Placeholder substituted with the hub's local port
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Callback invoked once per tunnel when its URL is discovered
pub type UrlCallback = Arc<dyn Fn(&DiscoveredUrl) -> anyhow::Result<()> + Send + Sync>;

/// A public URL extracted from a tunnel's output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// Normalized URL, always carrying a scheme
    pub url: String,
    /// Note copied from the tunnel spec
    pub note: Option<String>,
    /// Name of the tunnel that produced the URL
    pub name: String,
}

impl DiscoveredUrl {
    /// Create a new discovered URL
    pub fn new(url: impl Into<String>, note: Option<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note,
            name: name.into(),
        }
    }
}

impl fmt::Display for DiscoveredUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.url)?;
        if let Some(note) = &self.note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

/// Lifecycle state of the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HubState {
    /// No workers running
    #[default]
    Idle,
    /// Monitors and reporter have been spawned
    Running,
    /// `stop` is tearing the run down
    Stopping,
}

impl fmt::Display for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubState::Idle => write!(f, "idle"),
            HubState::Running => write!(f, "running"),
            HubState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Anything that can become a compiled match pattern
pub trait IntoPattern {
    fn into_pattern(self) -> Result<Regex, regex::Error>;
}

impl IntoPattern for Regex {
    fn into_pattern(self) -> Result<Regex, regex::Error> {
        Ok(self)
    }
}

impl IntoPattern for &Regex {
    fn into_pattern(self) -> Result<Regex, regex::Error> {
        Ok(self.clone())
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<Regex, regex::Error> {
        Regex::new(self)
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<Regex, regex::Error> {
        Regex::new(&self)
    }
}

/// Immutable description of one tunnel to launch
#[derive(Clone)]
pub struct TunnelSpec {
    /// Command template, may contain `{port}`
    pub command: String,
    /// Pattern locating the URL in a line of output
    pub pattern: Regex,
    /// Display name, also used for the private log file
    pub name: String,
    /// Optional note shown next to the URL
    pub note: Option<String>,
    /// Per-tunnel override of the hub's local port check
    pub check_local_port: Option<bool>,
    callback: Option<UrlCallback>,
}

impl TunnelSpec {
    /// Create a spec from a command template, a pattern and a name
    pub fn new(
        command: impl Into<String>,
        pattern: impl IntoPattern,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let pattern = pattern
            .into_pattern()
            .map_err(|source| ConfigError::InvalidPattern {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            command: command.into(),
            pattern,
            name,
            note: None,
            check_local_port: None,
            callback: None,
        })
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach a callback fired when this tunnel's URL is found
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DiscoveredUrl) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Override the hub's local port check for this tunnel
    pub fn with_local_port_check(mut self, check: bool) -> Self {
        self.check_local_port = Some(check);
        self
    }

    /// Per-tunnel callback, if any
    pub fn callback(&self) -> Option<&UrlCallback> {
        self.callback.as_ref()
    }

    /// Leading argv token of the command (the executable), split with
    /// the same quoting rules as [`argv`](Self::argv)
    pub fn executable(&self) -> Option<String> {
        shlex::split(&self.command)?.into_iter().next()
    }

    /// Whether the executable resolves on the search path
    pub fn is_executable_available(&self) -> bool {
        self.executable()
            .map(|exe| which::which(exe).is_ok())
            .unwrap_or(false)
    }

    /// Substitute the port into the command template.
    ///
    /// Only `{port}` is recognized; any other braces are left untouched.
    pub fn render_command(&self, port: u16) -> String {
        self.command.replace(PORT_PLACEHOLDER, &port.to_string())
    }

    /// Render the command and split it into argv using shell quoting rules
    pub fn argv(&self, port: u16) -> Result<Vec<String>, ConfigError> {
        let rendered = self.render_command(port);
        shlex::split(&rendered).ok_or_else(|| ConfigError::InvalidCommand {
            name: self.name.clone(),
            reason: format!("unbalanced quoting in `{}`", rendered),
        })
    }
}

impl fmt::Debug for TunnelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelSpec")
            .field("command", &self.command)
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .field("note", &self.note)
            .field("check_local_port", &self.check_local_port)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl TryFrom<&TunnelConfig> for TunnelSpec {
    type Error = ConfigError;

    fn try_from(config: &TunnelConfig) -> Result<Self, Self::Error> {
        let mut spec = TunnelSpec::new(
            config.command.clone(),
            config.pattern.as_str(),
            config.name.clone(),
        )?;
        spec.note = config.note.clone();
        spec.check_local_port = config.check_local_port;
        Ok(spec)
    }
}
