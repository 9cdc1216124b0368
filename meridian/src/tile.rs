//! [`TileGrid`] splits a plane into square tiles at power-of-two zoom levels, so a map can be
//! rendered in [tiles](TileIndex).

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::geo::WEB_MERCATOR_SRS;
use serde::{Deserialize, Serialize};

/// Half of the Web Mercator world width in meters.
const WEB_MERCATOR_HALF_WIDTH: f64 = 20037508.342787;

/// Highest supported zoom level.
pub const MAX_ZOOM: u32 = 30;

/// Direction in which tile `y` indices grow.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum VerticalDirection {
    /// Row 0 is at the top of the grid (XYZ scheme).
    TopToBottom,
    /// Row 0 is at the bottom of the grid (TMS scheme).
    BottomToTop,
}

/// Position of a tile in a grid.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Zoom level.
    pub z: u32,
}

impl TileIndex {
    /// Creates a new index.
    pub fn new(x: i32, y: i32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Square tile grid with the resolution halving at every zoom level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileGrid {
    origin: Point2,
    bounds: Rect,
    top_resolution: f64,
    tile_size: u32,
    y_direction: VerticalDirection,
    srs: String,
}

impl TileGrid {
    /// Standard Web Mercator (EPSG:3857) grid with one tile at zoom 0.
    ///
    /// ```
    /// use meridian::tile::{TileGrid, TileIndex};
    ///
    /// let grid = TileGrid::web_mercator(256);
    /// let world = grid.tile_bbox(TileIndex::new(0, 0, 0)).unwrap();
    /// assert!((world.x_max() - 20037508.342787).abs() < 1e-6);
    /// assert!((grid.resolution(0).unwrap() - 156543.03392800014).abs() < 1e-6);
    /// ```
    pub fn web_mercator(tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            origin: Point2::new(-WEB_MERCATOR_HALF_WIDTH, WEB_MERCATOR_HALF_WIDTH),
            bounds: Rect::new(
                -WEB_MERCATOR_HALF_WIDTH,
                -WEB_MERCATOR_HALF_WIDTH,
                WEB_MERCATOR_HALF_WIDTH,
                WEB_MERCATOR_HALF_WIDTH,
            ),
            top_resolution: 2.0 * WEB_MERCATOR_HALF_WIDTH / tile_size as f64,
            tile_size,
            y_direction: VerticalDirection::TopToBottom,
            srs: WEB_MERCATOR_SRS.to_string(),
        }
    }

    /// Same grid with `y` indices growing from the bottom.
    pub fn with_y_direction(mut self, y_direction: VerticalDirection) -> Self {
        self.origin = match y_direction {
            VerticalDirection::TopToBottom => Point2::new(self.bounds.x_min(), self.bounds.y_max()),
            VerticalDirection::BottomToTop => Point2::new(self.bounds.x_min(), self.bounds.y_min()),
        };
        self.y_direction = y_direction;
        self
    }

    /// Spatial reference of tile boxes.
    pub fn srs(&self) -> &str {
        &self.srs
    }

    /// Width and height of a tile in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Area covered by the grid.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Map units per pixel at the zoom level.
    pub fn resolution(&self, z: u32) -> Option<f64> {
        (z <= MAX_ZOOM).then(|| self.top_resolution / (1u64 << z) as f64)
    }

    /// Number of tiles along each axis at the zoom level.
    pub fn tiles_count(&self, z: u32) -> Option<i32> {
        (z <= MAX_ZOOM).then(|| 1i32 << z)
    }

    /// Bounding box of the tile in grid coordinates. `None` if the tile is outside of the grid.
    pub fn tile_bbox(&self, index: TileIndex) -> Option<Rect> {
        let count = self.tiles_count(index.z)?;
        if !(0..count).contains(&index.x) || !(0..count).contains(&index.y) {
            return None;
        }

        let tile_length = self.resolution(index.z)? * self.tile_size as f64;
        let x_min = self.origin.x + index.x as f64 * tile_length;
        let y_min = match self.y_direction {
            VerticalDirection::TopToBottom => self.origin.y - (index.y + 1) as f64 * tile_length,
            VerticalDirection::BottomToTop => self.origin.y + index.y as f64 * tile_length,
        };

        Some(Rect::new(
            x_min,
            y_min,
            x_min + tile_length,
            y_min + tile_length,
        ))
    }

    /// Iterates over the tiles of the zoom level that intersect the box, row by row.
    ///
    /// Tiles only touching the box at their border are not included.
    pub fn tiles_over(&self, bbox: &Rect, z: u32) -> Option<impl Iterator<Item = TileIndex>> {
        let count = self.tiles_count(z)?;
        let tile_length = self.resolution(z)? * self.tile_size as f64;
        let bbox = bbox.intersection(&self.bounds)?;

        let (top, bottom) = match self.y_direction {
            VerticalDirection::TopToBottom => (bbox.y_max(), bbox.y_min()),
            VerticalDirection::BottomToTop => (bbox.y_min(), bbox.y_max()),
        };

        let x_min = self.index_of(bbox.x_min() - self.origin.x, tile_length, count, false);
        let x_max = self.index_of(bbox.x_max() - self.origin.x, tile_length, count, true);
        let y_min = self.index_of(self.y_adj(top), tile_length, count, false);
        let y_max = self.index_of(self.y_adj(bottom), tile_length, count, true);

        Some((y_min..=y_max).flat_map(move |y| (x_min..=x_max).map(move |x| TileIndex { x, y, z })))
    }

    fn y_adj(&self, y: f64) -> f64 {
        match self.y_direction {
            VerticalDirection::TopToBottom => self.origin.y - y,
            VerticalDirection::BottomToTop => y - self.origin.y,
        }
    }

    fn index_of(&self, offset: f64, tile_length: f64, count: i32, upper: bool) -> i32 {
        let position = offset / tile_length;
        let index = if upper && (position - position.round()).abs() < 1e-9 {
            position.round() as i32 - 1
        } else {
            position.floor() as i32
        };
        index.clamp(0, count - 1)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn web_tile_boxes() {
        let grid = TileGrid::web_mercator(256);
        let tile = grid.tile_bbox(TileIndex::new(0, 0, 1)).unwrap();
        assert_relative_eq!(tile.x_min(), -WEB_MERCATOR_HALF_WIDTH);
        assert_relative_eq!(tile.y_min(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(tile.x_max(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(tile.y_max(), WEB_MERCATOR_HALF_WIDTH);

        assert!(grid.tile_bbox(TileIndex::new(2, 0, 1)).is_none());
        assert!(grid.tile_bbox(TileIndex::new(0, -1, 1)).is_none());
        assert!(grid.tile_bbox(TileIndex::new(0, 0, MAX_ZOOM + 1)).is_none());
    }

    #[test]
    fn bottom_to_top_rows() {
        let grid = TileGrid::web_mercator(256).with_y_direction(VerticalDirection::BottomToTop);
        let tile = grid.tile_bbox(TileIndex::new(0, 0, 1)).unwrap();
        assert_relative_eq!(tile.y_min(), -WEB_MERCATOR_HALF_WIDTH);
        assert_relative_eq!(tile.y_max(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn tiles_over_box() {
        let grid = TileGrid::web_mercator(256);
        let all: Vec<_> = grid.tiles_over(&grid.bounds(), 1).unwrap().collect();
        assert_eq!(
            all,
            [
                TileIndex::new(0, 0, 1),
                TileIndex::new(1, 0, 1),
                TileIndex::new(0, 1, 1),
                TileIndex::new(1, 1, 1),
            ]
        );

        let north_east = Rect::new(1000.0, 1000.0, 2000.0, 2000.0);
        let tiles: Vec<_> = grid.tiles_over(&north_east, 2).unwrap().collect();
        assert_eq!(tiles, [TileIndex::new(2, 1, 2)]);

        let outside = Rect::new(3e7, 3e7, 4e7, 4e7);
        assert!(grid.tiles_over(&outside, 2).is_none());
    }
}
