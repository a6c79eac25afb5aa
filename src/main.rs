//! Aggregraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod scenario;

#[derive(Parser)]
#[command(name = "aggregraph")]
#[command(about = "Fold graph nodes into aggregates and back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// TOML config for the aggregate graph
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the resulting graph and change batches as JSON
    Run {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },
    /// Show the graph of a scenario without running its operations
    Inspect {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for reports
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "aggregraph={},aggregraph_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Aggregraph v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { scenario } => commands::run(scenario, cli.config),
        Commands::Inspect { scenario } => commands::inspect(scenario, cli.config),
        Commands::Version => {
            println!("Aggregraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
