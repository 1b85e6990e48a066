//! Inkread CLI - handwriting recognition with result caching and quota-aware queueing.
//!
//! Images are recognized one at a time. When the free-tier quota runs out the
//! current image is queued and retried automatically once the cooldown ends.
//!
//! # Usage
//!
//! ```bash
//! # Recognize a single image
//! inkread recognize note.png
//!
//! # Recognize a directory, streaming JSON Lines to a file
//! inkread recognize ./scans/ --format jsonl --output predictions.jsonl
//!
//! # View configuration
//! inkread config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Inkread - handwriting recognition with result caching and quota-aware queueing.
#[derive(Parser, Debug)]
#[command(name = "inkread")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "INKREAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize handwriting in an image or a directory of images
    Recognize(cli::recognize::RecognizeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match &cli.config {
        Some(path) => inkread_core::Config::load_from(path)?,
        None => match inkread_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `inkread config path`."
                );
                inkread_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Inkread v{}", inkread_core::VERSION);

    match cli.command {
        Commands::Recognize(args) => cli::recognize::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
