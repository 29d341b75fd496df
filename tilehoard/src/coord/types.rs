//! Coordinate types for the Web Mercator tile pyramid.

use std::fmt;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude (degrees).
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude (degrees).
pub const MAX_LON: f64 = 180.0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Errors produced when validating coordinates and bounding boxes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("invalid zoom level: {0} (supported: 0-22)")]
    InvalidZoom(u8),

    /// `min_lon > max_lon`; wraparound boxes are not supported.
    #[error("bounding box crosses the antimeridian (min_lon {min_lon} > max_lon {max_lon}); split it into two regions")]
    CrossesAntimeridian { min_lon: f64, max_lon: f64 },

    /// The box has zero or negative extent on one axis.
    #[error("bounding box is empty: {0}")]
    EmptyExtent(String),
}

/// A single tile in the slippy-map pyramid.
///
/// `x` grows eastward, `y` grows southward, both in `[0, 2^z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tiles along one axis at the given zoom level.
#[inline]
pub fn grid_size(zoom: u8) -> u32 {
    1u32 << zoom
}

/// A geographic rectangle in degrees.
///
/// Always satisfies `min_lon < max_lon` and `min_lat < max_lat`; boxes that
/// wrap across the antimeridian are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box from `(min_lon, min_lat, max_lon, max_lat)`.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, CoordError> {
        for lon in [min_lon, max_lon] {
            if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        for lat in [min_lat, max_lat] {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        if min_lon > max_lon {
            return Err(CoordError::CrossesAntimeridian { min_lon, max_lon });
        }
        if min_lon == max_lon {
            return Err(CoordError::EmptyExtent(format!(
                "min_lon equals max_lon ({})",
                min_lon
            )));
        }
        if min_lat >= max_lat {
            return Err(CoordError::EmptyExtent(format!(
                "min_lat {} must be below max_lat {}",
                min_lat, max_lat
            )));
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Creates a bounding box from the `[min_lon, min_lat, max_lon, max_lat]`
    /// array form used in configuration files.
    pub fn from_array(bbox: [f64; 4]) -> Result<Self, CoordError> {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
