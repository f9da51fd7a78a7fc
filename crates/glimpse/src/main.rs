//! Glimpse CLI - image captioning pipeline.
//!
//! Glimpse extracts visual features from image sets, generates captions
//! grounded with context mined from a reference document, and scores captions
//! against human references.
//!
//! # Usage
//!
//! ```bash
//! # Generate captions with the configured defaults
//! glimpse run
//!
//! # Extract visual features
//! glimpse run --proc MODEL --input ./photos/
//!
//! # Caption with Mistral, grounded in a document
//! glimpse run --proc APPLY --model MISTRAL --context-doc history.docx
//!
//! # Score the latest captions
//! glimpse run --proc EVAL
//!
//! # Inspect the context found for a title
//! glimpse context history.docx --title "Puerto de Valencia"
//!
//! # Manage models and configuration
//! glimpse models download
//! glimpse config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glimpse_core::{device, Config, Device};

mod cli;
mod logging;

/// Glimpse - image captioning pipeline.
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (JSON or TOML)
    #[arg(long, global = true, env = "GLIMPSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a pipeline mode: MODEL (features), APPLY (captions), or EVAL (scores)
    Run(cli::run::RunArgs),

    /// Retrieve grounding context for a title from a document
    Context(cli::context::ContextArgs),

    /// Manage ONNX models (download, list, path)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => match Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `glimpse config path`."
                );
                Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Glimpse v{}", glimpse_core::VERSION);

    // Device bootstrap exports process environment variables, so it runs
    // before the runtime spawns its worker threads.
    match cli.command {
        Commands::Run(args) => {
            let device = bootstrap_device(&config);
            runtime()?.block_on(cli::run::execute(args, config, device))
        }
        Commands::Context(args) => {
            let device = bootstrap_device(&config);
            runtime()?.block_on(cli::context::execute(args, config, device))
        }
        Commands::Models(args) => runtime()?.block_on(cli::models::execute(args, config)),
        Commands::Config(args) => {
            runtime()?.block_on(cli::config::execute(args, config, cli.config))
        }
    }
}

fn bootstrap_device(config: &Config) -> Device {
    device::bootstrap(&config.defaults.device, &config.environment.accelerator)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
