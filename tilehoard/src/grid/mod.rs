//! Tile grid enumeration.
//!
//! Expands a geographic bounding box and a set of zoom levels into the exact
//! tile coordinates that cover it. Enumeration is pure math and never touches
//! the network or the disk.
//!
//! Tiles are produced zoom-ascending, so a partially completed run leaves a
//! region coarsely viewable before the detailed levels arrive.
//!
//! # Limitations
//!
//! Bounding boxes crossing the antimeridian are rejected by
//! [`BoundingBox::new`]; no wraparound is attempted.

use std::collections::BTreeSet;

use crate::coord::{
    grid_size, lat_to_tile_y, lon_to_tile_x, BoundingBox, CoordError, TileCoord, MAX_ZOOM,
};

/// Inclusive rectangle of tiles at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Number of tiles in the rectangle.
    pub fn len(&self) -> u64 {
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates tiles column by column (x outer, y inner).
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            next_x: self.min_x,
            next_y: self.min_y,
            done: false,
        }
    }
}

/// Iterator over the tiles of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    next_x: u32,
    next_y: u32,
    done: bool,
}

impl Iterator for TileRangeIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileCoord {
            z: self.range.z,
            x: self.next_x,
            y: self.next_y,
        };

        if self.next_y < self.range.max_y {
            self.next_y += 1;
        } else if self.next_x < self.range.max_x {
            self.next_x += 1;
            self.next_y = self.range.min_y;
        } else {
            self.done = true;
        }

        Some(tile)
    }
}

/// Tiles of a region across its zoom levels. See [`TileGrid::tiles`].
#[derive(Debug, Clone)]
pub struct RegionTiles {
    ranges: std::vec::IntoIter<TileRange>,
    current: Option<TileRangeIter>,
}

impl Iterator for RegionTiles {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tile) = self.current.as_mut().and_then(Iterator::next) {
                return Some(tile);
            }
            self.current = Some(self.ranges.next()?.iter());
        }
    }
}

/// Stateless tile grid calculator.
pub struct TileGrid;

impl TileGrid {
    /// Computes the tile rectangle covering `bbox` at `zoom`.
    ///
    /// The north edge (max latitude) maps to the smaller row because tile y
    /// grows southward.
    pub fn range(bbox: &BoundingBox, zoom: u8) -> Result<TileRange, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }

        let last = grid_size(zoom) - 1;
        let clip = |v: f64| -> u32 { (v.floor().max(0.0) as u32).min(last) };

        let min_x = clip(lon_to_tile_x(bbox.min_lon(), zoom));
        let max_x = clip(lon_to_tile_x(bbox.max_lon(), zoom));
        let min_y = clip(lat_to_tile_y(bbox.max_lat(), zoom));
        let max_y = clip(lat_to_tile_y(bbox.min_lat(), zoom));

        Ok(TileRange {
            z: zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Enumerates every tile covering `bbox` at a single zoom level.
    pub fn enumerate(bbox: &BoundingBox, zoom: u8) -> Result<Vec<TileCoord>, CoordError> {
        Ok(Self::range(bbox, zoom)?.iter().collect())
    }

    /// Lazily yields the union of tiles across `zooms`, lowest zoom first.
    ///
    /// Only the per-zoom rectangles are computed up front, so memory stays
    /// constant however many tiles the region holds.
    pub fn tiles(bbox: &BoundingBox, zooms: &BTreeSet<u8>) -> Result<RegionTiles, CoordError> {
        let ranges = zooms
            .iter()
            .map(|&z| Self::range(bbox, z))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RegionTiles {
            ranges: ranges.into_iter(),
            current: None,
        })
    }

    /// Counts the tiles [`TileGrid::tiles`] would yield without walking them.
    pub fn count(bbox: &BoundingBox, zooms: &BTreeSet<u8>) -> Result<u64, CoordError> {
        zooms
            .iter()
            .map(|&z| Self::range(bbox, z).map(|r| r.len()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::tile_bounds;

    fn qatar() -> BoundingBox {
        BoundingBox::new(50.0, 24.4, 52.0, 26.2).unwrap()
    }

    #[test]
    fn test_qatar_zoom_5_is_single_tile() {
        let tiles = TileGrid::enumerate(&qatar(), 5).unwrap();
        assert_eq!(tiles, vec![TileCoord { z: 5, x: 20, y: 13 }]);
    }

    #[test]
    fn test_qatar_zoom_6_spans_two_columns() {
        let tiles = TileGrid::enumerate(&qatar(), 6).unwrap();
        assert_eq!(
            tiles,
            vec![
                TileCoord { z: 6, x: 40, y: 27 },
                TileCoord { z: 6, x: 41, y: 27 },
            ]
        );
    }

    #[test]
    fn test_union_is_zoom_ascending() {
        let zooms: BTreeSet<u8> = [6, 5].into_iter().collect();
        let tiles: Vec<TileCoord> = TileGrid::tiles(&qatar(), &zooms).unwrap().collect();

        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0].z, 5);
        assert!(tiles[1..].iter().all(|t| t.z == 6));
        assert_eq!(TileGrid::count(&qatar(), &zooms).unwrap(), 3);
    }

    #[test]
    fn test_whole_world_at_zoom_2() {
        let world = BoundingBox::new(-180.0, -90.0, 180.0, 90.0).unwrap();
        let tiles = TileGrid::enumerate(&world, 2).unwrap();
        assert_eq!(tiles.len(), 16);
    }

    #[test]
    fn test_zoom_zero_is_root_tile() {
        let tiles = TileGrid::enumerate(&qatar(), 0).unwrap();
        assert_eq!(tiles, vec![TileCoord { z: 0, x: 0, y: 0 }]);
    }

    #[test]
    fn test_invalid_zoom_rejected() {
        assert!(matches!(
            TileGrid::enumerate(&qatar(), 23),
            Err(CoordError::InvalidZoom(23))
        ));
    }

    #[test]
    fn test_planet_at_max_zoom_is_lazy() {
        let world = BoundingBox::new(-180.0, -85.0, 180.0, 85.0).unwrap();
        let zooms = BTreeSet::from([MAX_ZOOM]);

        let count = TileGrid::count(&world, &zooms).unwrap();
        assert!(count > 17_000_000_000_000);

        let first: Vec<TileCoord> = TileGrid::tiles(&world, &zooms).unwrap().take(3).collect();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|t| t.z == MAX_ZOOM && t.x == 0));
        assert_eq!(first[1].y, first[0].y + 1);
    }

    #[test]
    fn test_tiles_skip_to_next_zoom() {
        let zooms = BTreeSet::from([0, 5, 6]);
        let tiles: Vec<TileCoord> = TileGrid::tiles(&qatar(), &zooms).unwrap().collect();
        assert_eq!(
            tiles,
            vec![
                TileCoord { z: 0, x: 0, y: 0 },
                TileCoord { z: 5, x: 20, y: 13 },
                TileCoord { z: 6, x: 40, y: 27 },
                TileCoord { z: 6, x: 41, y: 27 },
            ]
        );
        assert!(TileGrid::tiles(&qatar(), &BTreeSet::new()).unwrap().next().is_none());
    }

    #[test]
    fn test_range_iter_order() {
        let range = TileRange {
            z: 3,
            min_x: 1,
            max_x: 2,
            min_y: 4,
            max_y: 5,
        };
        let coords: Vec<(u32, u32)> = range.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(coords, vec![(1, 4), (1, 5), (2, 4), (2, 5)]);
        assert_eq!(range.len(), 4);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_enumeration_covers_bbox(
                min_lon in -179.0..170.0_f64,
                lon_span in 0.01..9.0_f64,
                min_lat in -80.0..70.0_f64,
                lat_span in 0.01..9.0_f64,
                zoom in 0u8..=10
            ) {
                let bbox = BoundingBox::new(min_lon, min_lat, min_lon + lon_span, min_lat + lat_span)?;
                let tiles = TileGrid::enumerate(&bbox, zoom)?;
                prop_assert!(!tiles.is_empty());

                let n = grid_size(zoom);
                let mut west = f64::MAX;
                let mut east = f64::MIN;
                let mut south = f64::MAX;
                let mut north = f64::MIN;
                for tile in &tiles {
                    prop_assert!(tile.x < n && tile.y < n);
                    let b = tile_bounds(tile);
                    west = west.min(b.west);
                    east = east.max(b.east);
                    south = south.min(b.south);
                    north = north.max(b.north);
                }

                // Union of footprints is a rectangle enclosing the bbox
                prop_assert!(west <= bbox.min_lon() + 1e-9);
                prop_assert!(east >= bbox.max_lon() - 1e-9);
                prop_assert!(south <= bbox.min_lat() + 1e-9);
                prop_assert!(north >= bbox.max_lat() - 1e-9);
                prop_assert_eq!(tiles.len() as u64, TileGrid::range(&bbox, zoom)?.len());
            }
        }
    }
}
