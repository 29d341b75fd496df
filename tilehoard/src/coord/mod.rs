//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator tile coordinates used by slippy-map tile servers.

mod types;

pub use types::{
    grid_size, BoundingBox, CoordError, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
};

use std::f64::consts::PI;

/// Geographic footprint of a single tile, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Fractional tile column for a longitude at the given zoom.
///
/// Not clipped: `lon = 180.0` maps to exactly `2^zoom`.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = f64::from(grid_size(zoom));
    (lon + 180.0) / 360.0 * n
}

/// Fractional tile row for a latitude at the given zoom.
///
/// Latitudes beyond the Mercator limit are clamped to it first, so the
/// poles map to the first and last rows instead of infinity.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = f64::from(grid_size(zoom));
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT) * PI / 180.0;
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n
}

/// Returns the geographic footprint of a tile.
pub fn tile_bounds(tile: &TileCoord) -> TileBounds {
    let (north, west) = corner_to_lat_lon(tile.x, tile.y, tile.z);
    let (south, east) = corner_to_lat_lon(tile.x + 1, tile.y + 1, tile.z);
    TileBounds {
        west,
        south,
        east,
        north,
    }
}

fn corner_to_lat_lon(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = f64::from(grid_size(zoom));

    let lon = f64::from(x) / n * 360.0 - 180.0;

    // Inverse Web Mercator
    let lat_rad = (PI * (1.0 - 2.0 * f64::from(y) / n)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}
