//! Common utilities shared across CLI commands.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tilehoard::AppConfig;

use crate::error::CliError;

/// Loads the configuration and applies command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    concurrency: Option<usize>,
    output: Option<PathBuf>,
) -> Result<AppConfig, CliError> {
    if concurrency == Some(0) {
        return Err(CliError::Config(
            "--concurrency must be at least 1".to_string(),
        ));
    }

    let mut config = AppConfig::load(path)?;
    if let Some(concurrency) = concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(output) = output {
        config = config.with_output_dir(output);
    }

    Ok(config)
}

/// Formats a zoom set compactly, collapsing consecutive levels: `5-7, 10`.
pub fn format_zoom_levels(zooms: &BTreeSet<u8>) -> String {
    let mut parts = Vec::new();
    let mut iter = zooms.iter().copied();

    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;

    for zoom in iter {
        if zoom == end + 1 {
            end = zoom;
            continue;
        }
        parts.push(format_run(start, end));
        start = zoom;
        end = zoom;
    }
    parts.push(format_run(start, end));

    parts.join(", ")
}

fn format_run(start: u8, end: u8) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
