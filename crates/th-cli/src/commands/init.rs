//! Init command implementation

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success};
use th_core::config::{self, ConfigFile};

/// Write the sample configuration to `config_path`
pub fn init_command(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(config_path, &ConfigFile::sample())
        .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

    print_success(&format!("Created configuration file: {:?}", config_path));
    print_info("Edit the [[tunnel]] entries, then start them with 'tunnelhub run'");
    Ok(())
}
