//! Region requests and the tile grid that covers them.

use crate::error::RegionError;
use crate::pyramid::PyramidIndex;

// =============================================================================
// Region Request
// =============================================================================

/// A rectangle in level-0 pixel coordinates, read at a downsample factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRequest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub downsample: f64,
}

impl RegionRequest {
    pub fn new(x: u32, y: u32, width: u32, height: u32, downsample: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            downsample,
        }
    }

    /// Check the request against the level-0 image size.
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<(), RegionError> {
        if !self.downsample.is_finite() || self.downsample <= 0.0 {
            return Err(RegionError::InvalidDownsample(self.downsample));
        }

        let fits = |start: u32, span: u32, limit: u32| {
            span > 0 && u64::from(start) + u64::from(span) <= u64::from(limit)
        };

        if !fits(self.x, self.width, image_width) || !fits(self.y, self.height, image_height) {
            return Err(RegionError::InvalidRegion {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                image_width,
                image_height,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Tile Grid
// =============================================================================

/// The block of tiles a region read fetches from one level.
///
/// Tile coordinates here are 0-based; the pyramid is queried at `+1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    pub level: usize,
    pub scale: f64,
    pub tile_width: u32,
    pub tile_height: u32,
    pub base_tile_x: u32,
    pub base_tile_y: u32,
    pub tiles_across_x: u32,
    pub tiles_across_y: u32,
}

impl TileGrid {
    /// Work out which tiles cover a validated request.
    ///
    /// The origin is snapped to the nearest tile boundary of the selected
    /// level and the span is the request size at that level, rounded half up.
    /// The block is kept inside the level's tile grid.
    pub fn plan(pyramid: &PyramidIndex, request: &RegionRequest) -> Self {
        let level = pyramid.select_level(request.downsample);
        let scale = pyramid.downsamples()[level];
        let (tile_width, tile_height, tiles_x, tiles_y) = match pyramid.level(level) {
            Some(l) => (l.tile_width(), l.tile_height(), l.tiles_x(), l.tiles_y()),
            None => (pyramid.tile_width(), pyramid.tile_height(), 1, 1),
        };

        let span_x = level_span(request.width, scale);
        let span_y = level_span(request.height, scale);
        let tiles_across_x = span_x.div_ceil(tile_width).clamp(1, tiles_x);
        let tiles_across_y = span_y.div_ceil(tile_height).clamp(1, tiles_y);

        let base_tile_x = snap(request.x, scale, tile_width).min(tiles_x - tiles_across_x);
        let base_tile_y = snap(request.y, scale, tile_height).min(tiles_y - tiles_across_y);

        Self {
            level,
            scale,
            tile_width,
            tile_height,
            base_tile_x,
            base_tile_y,
            tiles_across_x,
            tiles_across_y,
        }
    }

    /// Number of tiles in the block.
    pub fn len(&self) -> usize {
        self.tiles_across_x as usize * self.tiles_across_y as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Output raster width in pixels.
    pub fn raster_width(&self) -> u32 {
        self.tiles_across_x * self.tile_width
    }

    /// Output raster height in pixels.
    pub fn raster_height(&self) -> u32 {
        self.tiles_across_y * self.tile_height
    }

    /// 0-based level tile coordinate of slot `(dx, dy)`.
    pub fn tile_at(&self, dx: u32, dy: u32) -> (u32, u32) {
        (self.base_tile_x + dx, self.base_tile_y + dy)
    }

    /// Grid slots in row-major order as `(dx, dy)`.
    pub fn slots(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.tiles_across_y)
            .flat_map(move |dy| (0..self.tiles_across_x).map(move |dx| (dx, dy)))
    }
}

/// Request span at `scale`, rounded half up, never zero.
fn level_span(span: u32, scale: f64) -> u32 {
    ((f64::from(span) / scale + 0.5).floor() as u32).max(1)
}

/// Tile index nearest to a level-0 origin.
fn snap(origin: u32, scale: f64, tile_size: u32) -> u32 {
    ((f64::from(origin) / scale + 0.5) / f64::from(tile_size)).round() as u32
}

// =============================================================================
// Tests
// =============================================================================
