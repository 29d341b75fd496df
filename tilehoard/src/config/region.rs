//! Named download regions.

use std::collections::BTreeSet;

use crate::coord::{BoundingBox, CoordError};
use crate::grid::TileGrid;

/// A named area to download at a fixed set of zoom levels.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    description: Option<String>,
    bbox: BoundingBox,
    zoom_levels: BTreeSet<u8>,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        bbox: BoundingBox,
        zoom_levels: BTreeSet<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            bbox,
            zoom_levels,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Zoom levels in ascending order.
    pub fn zoom_levels(&self) -> &BTreeSet<u8> {
        &self.zoom_levels
    }

    /// Total number of tiles across all zoom levels.
    pub fn tile_count(&self) -> Result<u64, CoordError> {
        TileGrid::count(&self.bbox, &self.zoom_levels)
    }
}

/// Whether `name` can be used as a single directory component.
pub(crate) fn is_valid_region_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_count() {
        let region = Region::new(
            "qatar",
            BoundingBox::new(50.0, 24.4, 52.0, 26.2).unwrap(),
            [5, 6].into_iter().collect(),
        )
        .with_description("Qatar peninsula");

        assert_eq!(region.tile_count().unwrap(), 3);
        assert_eq!(region.description(), Some("Qatar peninsula"));
        assert_eq!(region.zoom_levels().iter().next(), Some(&5));
    }

    #[test]
    fn test_region_names() {
        assert!(is_valid_region_name("qatar"));
        assert!(is_valid_region_name("new-york_2"));
        assert!(!is_valid_region_name(""));
        assert!(!is_valid_region_name(".."));
        assert!(!is_valid_region_name("a/b"));
        assert!(!is_valid_region_name("a\\b"));
    }
}
