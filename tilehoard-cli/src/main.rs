//! TileHoard CLI - Command-line interface
//!
//! Downloads the map tiles of configured regions into a local directory tree.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilehoard::logging::{default_log_dir, init_logging};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "tilehoard")]
#[command(version, about = "Download map tiles for configured regions", long_about = None)]
struct Cli {
    /// Configuration file (default: ./config.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the session log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every missing tile of a region
    Download {
        /// Region name from the configuration file
        region: String,

        /// Number of concurrent downloads
        #[arg(long)]
        concurrency: Option<usize>,

        /// Output root directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// List the configured regions
    ListRegions,
}

fn main() {
    let cli = Cli::parse();

    let log_dir = cli.log_dir.clone().unwrap_or_else(default_log_dir);
    let logging_guard = match init_logging(&log_dir) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(format!("{}: {}", log_dir.display(), e)).exit(),
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %logging_guard.log_path().display(),
        "TileHoard starting"
    );

    let result = match cli.command {
        Commands::Download {
            region,
            concurrency,
            output,
            no_progress,
        } => commands::download::run(commands::download::DownloadArgs {
            config: cli.config,
            region,
            concurrency,
            output,
            show_progress: !no_progress,
        }),
        Commands::ListRegions => commands::list::run(cli.config.as_deref()),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        drop(logging_guard);
        e.exit();
    }
}
