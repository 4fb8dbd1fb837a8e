//! Run command implementation

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{print_info, print_success, print_warning};
use th_core::config::{self, ConfigFile};
use th_core::{ConfigError, LogContext, TunnelSpec};
use th_hub::TunnelHub;

/// Options of `tunnelhub run`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Local service port (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait for every tunnel URL, 0 waits forever (overrides config)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Launch tunnels without waiting for the local port
    #[arg(long)]
    pub no_port_check: bool,

    /// Stop the tunnels right after the URLs are reported
    #[arg(long)]
    pub once: bool,

    /// Print the discovered URLs as JSON instead of the report block
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Directory for the run log and per-tunnel logs (overrides config)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Load the configuration file, pointing at `init` when it is missing
pub(crate) fn load_config_file(path: &Path) -> Result<ConfigFile> {
    match config::load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(path)) => anyhow::bail!(
            "Config file not found: {:?}. Run 'tunnelhub init' to create one",
            path
        ),
        Err(e) => Err(e).with_context(|| format!("Failed to load config file: {:?}", path)),
    }
}

/// Apply command-line overrides to the loaded configuration
fn apply_overrides(config: &mut ConfigFile, args: &RunArgs, verbose: u8, quiet: bool) {
    let hub = &mut config.hub;
    if let Some(port) = args.port {
        hub.port = port;
    }
    if let Some(secs) = args.timeout {
        hub.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if args.no_port_check {
        hub.check_local_port = false;
    }
    if args.json {
        hub.show_report = false;
    }

    let log = &mut config.log;
    match verbose {
        0 => {}
        1 => log.level = "debug".to_string(),
        _ => log.level = "trace".to_string(),
    }
    if quiet {
        log.console = false;
    }
    if args.no_color {
        log.color = false;
    }
    if let Some(dir) = &args.log_dir {
        log.dir = Some(dir.clone());
    }
}

/// Status lines go to the terminal unless silenced or stdout carries JSON
fn shows_status(args: &RunArgs, quiet: bool) -> bool {
    !quiet && !args.json
}

/// Start every configured tunnel and keep them up until Ctrl+C
pub async fn run_command(config_path: &Path, args: &RunArgs, verbose: u8, quiet: bool) -> Result<()> {
    let mut config = load_config_file(config_path)?;
    apply_overrides(&mut config, args, verbose, quiet);

    let logs = LogContext::new(config.log.clone()).context("Failed to set up logging")?;
    logs.install_global()?;

    let hub = TunnelHub::new(config.hub.clone(), logs);
    for tunnel in &config.tunnels {
        hub.add_tunnel(TunnelSpec::try_from(tunnel)?);
    }

    if args.json {
        hub.set_callback(|urls| {
            println!("{}", serde_json::to_string_pretty(urls)?);
            Ok(())
        });
    }

    hub.start().await?;

    // Interrupted before the report
    if !hub.is_running() {
        return Ok(());
    }

    if args.once {
        hub.stop().await?;
        return Ok(());
    }

    let chatty = shows_status(args, quiet);
    if chatty {
        print_info("Tunnels are running. Press Ctrl+C to stop.");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    if chatty {
        print_warning("Stopping tunnels...");
    }
    hub.stop().await?;
    if chatty {
        print_success("All tunnels stopped");
    }
    Ok(())
}
