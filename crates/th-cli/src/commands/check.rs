//! Check command implementation

use std::path::Path;

use anyhow::Result;

use crate::commands::run::load_config_file;
use crate::output::{format_tunnels, print_error, print_info, print_success, print_warning};
use th_core::TunnelSpec;

/// List configured tunnels and whether their clients are installed
pub fn check_command(config_path: &Path) -> Result<()> {
    let config = load_config_file(config_path)?;

    print_info(&format!("Configuration file: {:?}", config_path));
    println!("{}", format_tunnels(&config.tunnels));

    let mut runnable = 0;
    for tunnel in &config.tunnels {
        match TunnelSpec::try_from(tunnel) {
            Ok(spec) if spec.is_executable_available() => runnable += 1,
            Ok(_) => {}
            Err(e) => print_error(&e.to_string()),
        }
    }

    match runnable {
        0 => print_warning("No tunnel client is installed"),
        n => print_success(&format!("{} of {} tunnels can be started", n, config.tunnels.len())),
    }
    Ok(())
}
