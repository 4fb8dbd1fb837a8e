//! th-core: Core types and configuration for TunnelHub
//!
//! This crate provides the tunnel spec and result types, the error
//! taxonomy, configuration structures, the logging context, local port
//! polling and URL extraction used by the hub and the CLI.

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod port;
pub mod types;

pub use error::{ConfigError, HubError, TunnelError};
pub use logging::{LogContext, TunnelLog};
pub use port::WaitOutcome;
pub use types::{DiscoveredUrl, HubState, IntoPattern, TunnelSpec, UrlCallback};
