//! rymis command-line interface
//!
//! Sequences the simulation and optimization crates from a YAML run file:
//!
//! ```text
//! rymis default-config > run.yaml
//! rymis adiabatic --config run.yaml
//! rymis optimize --config run.yaml -v
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{adiabatic, default_config, optimize};

/// rymis - Rydberg-blockade simulation for maximum independent set
#[derive(Parser)]
#[command(name = "rymis")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve the lattice under the fixed linear sweep and report the outcome
    Adiabatic {
        /// Run file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Print a JSON report instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Optimize the detuning profile variationally
    Optimize {
        /// Run file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Print a JSON report instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Print a complete default run file
    DefaultConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Adiabatic { config, json } => adiabatic::execute(&config, json),
        Commands::Optimize { config, json } => optimize::execute(&config, json),
        Commands::DefaultConfig => default_config::execute(),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
