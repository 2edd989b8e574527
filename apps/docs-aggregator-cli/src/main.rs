//! Gateway documentation aggregator
//!
//! Reads a gateway configuration file and renders one merged `OpenAPI`
//! document per output name from the upstream services it routes to.
//!
//! # Usage
//!
//! ```bash
//! # Render every document into a directory
//! docs-aggregator --config gateway.yaml render --output target/docs --pretty
//!
//! # Print one document to stdout
//! docs-aggregator --config gateway.yaml render --document orders
//!
//! # Validate configuration
//! docs-aggregator --config gateway.yaml check
//!
//! # Re-render whenever the configuration changes
//! docs-aggregator --config gateway.yaml -v watch --output target/docs
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod check;
mod list;
mod logging;
mod render;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docs_aggregator::{AggregationEngine, ConfigStore};
use tokio_util::sync::CancellationToken;

use crate::logging::LogFormat;

/// Gateway documentation aggregator
#[derive(Parser)]
#[command(name = "docs-aggregator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the gateway configuration file (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate documents and write them to files or stdout
    Render(render::RenderArgs),
    /// Print the document names served by the configuration
    List(list::ListArgs),
    /// Load and resolve the configuration, reporting rejected sources
    Check,
    /// Re-render documents whenever the configuration file changes
    Watch(watch::WatchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    if !cli.config.is_file() {
        anyhow::bail!("config file does not exist: {}", cli.config.display());
    }

    let store = Arc::new(
        ConfigStore::from_path(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?,
    );

    match cli.command {
        Commands::Check => Ok(check::run(&store.snapshot())),
        Commands::List(args) => {
            args.run(&AggregationEngine::new(store))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Render(args) => {
            let engine = AggregationEngine::new(store);
            args.run(&engine, &shutdown_token()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Watch(args) => {
            let engine = AggregationEngine::new(store);
            args.run(&cli.config, &engine, &shutdown_token()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Token cancelled on Ctrl+C.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C signal");
                trigger.cancel();
            }
            Err(e) => tracing::error!(%e, "Error handling Ctrl+C signal"),
        }
    });
    token
}
