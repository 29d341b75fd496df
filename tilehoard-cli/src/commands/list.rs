//! List-regions command.

use std::path::Path;

use console::style;
use tilehoard::TileHoard;

use super::common::{format_zoom_levels, load_config};
use crate::error::CliError;

/// Prints `name: description` for every configured region.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path, None, None)?;
    let app = TileHoard::new(config)?;
    let regions = app.list_regions();

    if regions.is_empty() {
        println!("No regions configured.");
        return Ok(());
    }

    for region in regions {
        println!(
            "{}: {}",
            style(region.name()).bold(),
            region.description().unwrap_or("(no description)")
        );
        let tiles = region
            .tile_count()
            .map(|n| n.to_string())
            .unwrap_or_else(|e| format!("invalid ({})", e));
        println!(
            "    zoom {} | {} tiles",
            format_zoom_levels(region.zoom_levels()),
            tiles
        );
    }

    Ok(())
}
