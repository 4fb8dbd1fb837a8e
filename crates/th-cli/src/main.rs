//! TunnelHub CLI
//!
//! Launches the configured tunnel clients, prints the public URLs they
//! report, and keeps them alive until Ctrl+C.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use th_core::config;
use tunnelhub::commands::{self, RunArgs};

#[derive(Parser)]
#[command(name = "tunnelhub")]
#[command(author, version, about = "Launch tunnel clients and collect their public URLs")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress log output on the console
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the configured tunnels and report their URLs (default)
    Run(RunArgs),

    /// Show configured tunnels and whether their clients are installed
    Check,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            commands::run_command(&config_path, &args, cli.verbose, cli.quiet).await
        }
        Commands::Check => commands::check_command(&config_path),
        Commands::Init { force } => commands::init_command(&config_path, force),
    }
}
