//! Strata CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod script;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Replay operation scripts against a partially persistent graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script and print the result of every operation as JSON lines
    Replay {
        /// Script file (.toml or .json)
        script: PathBuf,
    },
    /// Run a script and print the graph as it stood at one version
    Render {
        /// Script file (.toml or .json)
        script: PathBuf,

        /// Version to render (defaults to the latest)
        #[arg(long)]
        at: Option<u64>,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "strata={0},strata_core={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Replay { script } => commands::replay(script),
        Commands::Render { script, at } => commands::render(script, at),
        Commands::Version => {
            println!("Strata v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
