//! th-cli: Command-line interface for TunnelHub
//!
//! Provides the `tunnelhub` binary: run the configured tunnels, check
//! which clients are installed, and write a starter configuration.

pub mod commands;
pub mod output;
