//! class-pipeline: inspect a class-bytecode transformation pipeline offline
//!
//! ## Commands
//!
//! - **resolve**: look a class up through the primary and parent loader tiers
//! - **chain**: build the delegation chain for a transformer manifest
//! - **phase**: run initial phase negotiation with given probe values
//! - **config**: show the effective configuration
//!
//! ## Example Usage
//!
//! ```bash
//! # Where does a class come from?
//! class-pipeline resolve net.example.Target -c build/classes --parent libs/
//!
//! # Which transformers would be delegated to?
//! class-pipeline chain --manifest transformers.json --exclude Bar
//!
//! # Was the engine started early?
//! class-pipeline phase --line 141 --command "java devlaunchinjector.Main"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod pipeline_cli;

use pipeline_cli::{chain::ChainCmd, phase::PhaseCmd, resolve::ResolveCmd};

#[derive(Parser)]
#[command(
    name = "class-pipeline",
    author,
    version,
    about = "Class-bytecode transformation pipeline tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.class-pipeline/config.json when present)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logs and metrics)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a class through the loader tiers
    Resolve(ResolveCmd),

    /// Build the delegation chain for a transformer manifest
    Chain(ChainCmd),

    /// Negotiate the initial bootstrap phase
    Phase(PhaseCmd),

    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "class_pipeline=debug,class_pipeline_core=debug,warn"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let Cli {
        command,
        config,
        json,
        verbose,
    } = Cli::parse();
    init_tracing(verbose);

    let (config, source) = pipeline_cli::paths::load_config(config.as_deref())?;

    match command {
        Commands::Resolve(cmd) => cmd.execute(json, verbose),
        Commands::Chain(cmd) => cmd.execute(&config, json, verbose),
        Commands::Phase(cmd) => cmd.execute(&config, json),
        Commands::Config => pipeline_cli::show_config::execute(&config, source.as_deref(), json),
    }
}
