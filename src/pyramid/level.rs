//! Tile index for a single pyramid level.
//!
//! A level is assembled from one or more instances with identical geometry.
//! Tiles are stored in a flat arena indexed by `(row - 1) * tiles_x + (col - 1)`,
//! with DICOM's 1-based column and row numbers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::dicom::{InstanceMetadata, TilingMode};
use crate::error::IngestionError;

use super::frame::FrameReference;

// =============================================================================
// Level Geometry
// =============================================================================

/// Pixel geometry shared by every instance of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelGeometry {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiling_mode: TilingMode,
}

impl LevelGeometry {
    /// The geometry an instance declares.
    pub fn of(instance: &InstanceMetadata) -> Self {
        Self {
            width: instance.total_pixel_matrix_columns,
            height: instance.total_pixel_matrix_rows,
            tile_width: instance.columns,
            tile_height: instance.rows,
            tiling_mode: instance.tiling_mode,
        }
    }

    /// Number of tile columns, counting a partial last column.
    #[inline]
    pub fn tiles_x(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    /// Number of tile rows, counting a partial last row.
    #[inline]
    pub fn tiles_y(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }
}

impl fmt::Display for LevelGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} px in {}x{} tiles ({})",
            self.width, self.height, self.tile_width, self.tile_height, self.tiling_mode
        )
    }
}

// =============================================================================
// Level Index
// =============================================================================

/// Maps the tile coordinates of one level to the frames that hold them.
#[derive(Debug, Clone)]
pub struct LevelIndex {
    geometry: LevelGeometry,
    tiles_x: u32,
    tiles_y: u32,
    frames: Vec<Option<FrameReference>>,
    assigned: usize,
}

impl LevelIndex {
    /// Start a level from its first instance, adopting that instance's geometry.
    pub fn new(instance: &InstanceMetadata) -> Result<Self, IngestionError> {
        let geometry = LevelGeometry::of(instance);
        let invalid = |reason: &str| IngestionError::InvalidGeometry {
            instance: instance.sop_instance_uid.clone(),
            reason: reason.to_string(),
        };

        if geometry.tile_width == 0 || geometry.tile_height == 0 {
            return Err(invalid("tile size must be non-zero"));
        }
        if geometry.width == 0 || geometry.height == 0 {
            return Err(invalid("level size must be non-zero"));
        }

        let tiles_x = geometry.tiles_x();
        let tiles_y = geometry.tiles_y();
        let slots = (tiles_x as usize)
            .checked_mul(tiles_y as usize)
            .ok_or_else(|| invalid("tile grid is too large"))?;

        let mut level = Self {
            geometry,
            tiles_x,
            tiles_y,
            frames: vec![None; slots],
            assigned: 0,
        };
        level.add_instance(instance)?;
        Ok(level)
    }

    /// Index the frames of another instance of this level.
    ///
    /// Fails with `GeometryMismatch` if the instance's geometry differs,
    /// `DuplicateTile` if a coordinate is already taken, and `TileOutOfRange`
    /// if a frame falls outside the tile grid.
    pub fn add_instance(&mut self, instance: &InstanceMetadata) -> Result<(), IngestionError> {
        let found = LevelGeometry::of(instance);
        if found != self.geometry {
            return Err(IngestionError::GeometryMismatch {
                instance: instance.sop_instance_uid.clone(),
                expected: self.geometry.to_string(),
                found: found.to_string(),
            });
        }

        let uid: Arc<str> = Arc::from(instance.sop_instance_uid.as_str());
        match self.geometry.tiling_mode {
            TilingMode::Full => self.add_full(instance, &uid)?,
            TilingMode::Sparse => self.add_sparse(instance, &uid)?,
        }

        debug!(
            instance = %uid,
            mode = %self.geometry.tiling_mode,
            assigned = self.assigned,
            total = self.frames.len(),
            "Indexed instance frames"
        );
        Ok(())
    }

    /// Frames fill the grid row-major from the concatenation offset.
    fn add_full(
        &mut self,
        instance: &InstanceMetadata,
        uid: &Arc<str>,
    ) -> Result<(), IngestionError> {
        let offset = u64::from(instance.frame_offset());
        let tiles_x = u64::from(self.tiles_x);
        let capacity = self.frames.len() as u64;

        for frame in 1..=instance.number_of_frames {
            let slot = offset + u64::from(frame) - 1;
            let tile_x = (slot % tiles_x + 1) as u32;
            let tile_y = u32::try_from(slot / tiles_x + 1).unwrap_or(u32::MAX);

            if slot >= capacity {
                return Err(self.out_of_range(instance, frame, tile_x, tile_y));
            }
            self.insert(slot as usize, FrameReference::new(uid.clone(), frame), tile_x, tile_y)?;
        }

        Ok(())
    }

    /// Each frame carries its own (column, row).
    fn add_sparse(
        &mut self,
        instance: &InstanceMetadata,
        uid: &Arc<str>,
    ) -> Result<(), IngestionError> {
        for (index, &(tile_x, tile_y)) in instance.per_frame_tile_coordinates.iter().enumerate() {
            let frame = index as u32 + 1;
            let slot = self
                .slot(tile_x, tile_y)
                .ok_or_else(|| self.out_of_range(instance, frame, tile_x, tile_y))?;
            self.insert(slot, FrameReference::new(uid.clone(), frame), tile_x, tile_y)?;
        }

        Ok(())
    }

    fn insert(
        &mut self,
        slot: usize,
        frame: FrameReference,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<(), IngestionError> {
        let entry = &mut self.frames[slot];
        if entry.is_some() {
            return Err(IngestionError::DuplicateTile {
                instance: frame.instance_uid().to_string(),
                frame: frame.frame_index(),
                tile_x,
                tile_y,
            });
        }

        *entry = Some(frame);
        self.assigned += 1;
        Ok(())
    }

    fn out_of_range(
        &self,
        instance: &InstanceMetadata,
        frame: u32,
        tile_x: u32,
        tile_y: u32,
    ) -> IngestionError {
        IngestionError::TileOutOfRange {
            instance: instance.sop_instance_uid.clone(),
            frame,
            tile_x,
            tile_y,
            tiles_x: self.tiles_x,
            tiles_y: self.tiles_y,
        }
    }

    /// Arena slot of a 1-based tile coordinate.
    #[inline]
    fn slot(&self, tile_x: u32, tile_y: u32) -> Option<usize> {
        if tile_x == 0 || tile_y == 0 || tile_x > self.tiles_x || tile_y > self.tiles_y {
            return None;
        }
        Some((tile_y as usize - 1) * self.tiles_x as usize + (tile_x as usize - 1))
    }

    /// Frame holding the tile at 1-based (`tile_x`, `tile_y`), if assigned.
    #[inline]
    pub fn get_frame(&self, tile_x: u32, tile_y: u32) -> Option<&FrameReference> {
        self.slot(tile_x, tile_y)
            .and_then(|slot| self.frames[slot].as_ref())
    }

    /// All assigned tiles as `((tile_x, tile_y), frame)`, row-major.
    pub fn assignments(&self) -> impl Iterator<Item = ((u32, u32), &FrameReference)> + '_ {
        let tiles_x = self.tiles_x as usize;
        self.frames.iter().enumerate().filter_map(move |(slot, frame)| {
            frame.as_ref().map(|frame| {
                let tile_x = (slot % tiles_x) as u32 + 1;
                let tile_y = (slot / tiles_x) as u32 + 1;
                ((tile_x, tile_y), frame)
            })
        })
    }

    pub fn geometry(&self) -> LevelGeometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn tile_width(&self) -> u32 {
        self.geometry.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.geometry.tile_height
    }

    pub fn tiling_mode(&self) -> TilingMode {
        self.geometry.tiling_mode
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    /// Number of tile coordinates that have a frame.
    pub fn assigned_tiles(&self) -> usize {
        self.assigned
    }

    /// Whether every tile of the grid has a frame.
    pub fn is_complete(&self) -> bool {
        self.assigned == self.frames.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
