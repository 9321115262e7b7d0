//! # fhir-refs
//!
//! Resolves conditional and placeholder references in a FHIR batch/transaction
//! Bundle against a set of existing resources.

use anyhow::Context;
use clap::{Parser, Subcommand};

mod config;
mod logging;
mod resolve;

use config::CliConfig;
use resolve::ResolveCommand;

#[derive(Parser)]
#[command(name = "fhir-refs")]
#[command(about = "Resolve conditional references in FHIR transaction bundles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./fhir-refs.toml when present)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve references in a Bundle and print the result
    Resolve(ResolveCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Resolve(cmd) => cmd.execute(config).await,
    }
}
