//! Download command - fetch every missing tile of one region.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use tilehoard::{ProgressCallback, ProgressSnapshot, RunReport, TileHoard};
use tokio_util::sync::CancellationToken;

use super::common::{format_zoom_levels, load_config};
use crate::error::CliError;

/// Failed coordinates printed before the list is truncated.
const MAX_FAILED_SHOWN: usize = 20;

/// Arguments for the download command.
pub struct DownloadArgs {
    pub config: Option<PathBuf>,
    pub region: String,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub show_progress: bool,
}

/// Run the download command.
pub fn run(args: DownloadArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref(), args.concurrency, args.output)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing in-flight tiles...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    let report = runtime.block_on(async {
        let app = TileHoard::new(config)?;
        let region = app.region(&args.region)?;

        println!("TileHoard v{}", env!("CARGO_PKG_VERSION"));
        println!("==================");
        println!();
        println!("Region:      {}", region.name());
        if let Some(description) = region.description() {
            println!("             {}", description);
        }
        println!("Zoom levels: {}", format_zoom_levels(region.zoom_levels()));
        println!("Output:      {}", app.settings().output_dir.display());
        println!("Workers:     {}", app.settings().concurrency);
        println!();
        println!("Press Ctrl+C to stop");
        println!();

        let bar = args.show_progress.then(new_progress_bar);
        let callback = bar.clone().map(progress_callback);

        let report = app.download_region(&args.region, cancel, callback).await?;

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok::<RunReport, CliError>(report)
    })?;

    print_summary(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            state: report.state.clone(),
            failed: report.summary.failed,
        })
    }
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) ETA {eta} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn progress_callback(bar: ProgressBar) -> ProgressCallback {
    Arc::new(move |snapshot: &ProgressSnapshot| {
        bar.set_length(snapshot.total);
        bar.set_position(snapshot.done);
        bar.set_message(format!(
            "{} written, {} failed",
            HumanBytes(snapshot.bytes_written),
            snapshot.failed
        ));
    })
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    let state = if report.is_success() {
        style(report.state.to_string()).green()
    } else {
        style(report.state.to_string()).red()
    };

    println!();
    println!(
        "Region {}: {} in {}",
        style(&summary.region).bold(),
        state,
        HumanDuration(summary.elapsed)
    );
    println!("───────────────");
    println!("  Requested:  {}", summary.requested);
    println!("  Skipped:    {} (already on disk)", summary.skipped);
    println!(
        "  Downloaded: {} ({} not available upstream)",
        summary.succeeded, summary.absent
    );
    println!("  Failed:     {}", summary.failed);
    if summary.unfinished() > 0 {
        println!("  Unfinished: {}", summary.unfinished());
    }
    println!("  Written:    {}", HumanBytes(summary.bytes_written));

    if !summary.server_health.is_empty() {
        println!();
        println!("Servers");
        for health in &summary.server_health {
            let tally = summary
                .by_server
                .get(&health.name)
                .cloned()
                .unwrap_or_default();
            println!(
                "  {:<20} {:>7} ok {:>6} absent {:>6} failed {:>10}  [{}]",
                health.name,
                tally.succeeded,
                tally.absent,
                tally.failed,
                HumanBytes(tally.bytes_written).to_string(),
                health.state
            );
        }
    }

    if !summary.failed_coordinates.is_empty() {
        println!();
        println!("Failed tiles");
        for failed in summary.failed_coordinates.iter().take(MAX_FAILED_SHOWN) {
            println!("  {}: {}", failed.coordinate, failed.error);
        }
        let hidden = summary.failed_coordinates.len().saturating_sub(MAX_FAILED_SHOWN);
        if hidden > 0 {
            println!("  ... and {} more (see the log file)", hidden);
        }
    }
}
