//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Command line interface for network construction and fault evaluation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gridfault_common::{init_console, init_tracing, EngineConfig};

mod fault;
mod network;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "GridFault network builder and short-circuit evaluator",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML). GRIDFAULT_CONFIG takes precedence.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write structured logs to the configured log directory instead of stderr.
    #[arg(long = "log-to-file", global = true, action = ArgAction::SetTrue)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the network and report construction diagnostics.
    Build(network::BuildCommand),
    /// Evaluate a single short-circuit fault.
    Fault(fault::FaultCommand),
    /// Print the categorical line capacitance table.
    Capacitance(network::CapacitanceCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    if cli.log_to_file {
        init_tracing("gridfaultctl", &config.logging)?;
    } else {
        init_console();
    }

    match cli.command {
        Commands::Build(cmd) => cmd.execute(&config),
        Commands::Fault(cmd) => cmd.execute(&config),
        Commands::Capacitance(cmd) => cmd.execute(&config),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<EngineConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("gridfault.toml"));
    candidates.push(PathBuf::from("configs/gridfault.toml"));

    let loaded = EngineConfig::load_with_source(&candidates)?;
    loaded
        .config
        .validate()
        .with_context(|| match &loaded.source {
            Some(path) => format!("invalid configuration in {}", path.display()),
            None => "invalid default configuration".to_string(),
        })?;
    Ok(loaded.config)
}
