//! Multi-resolution index over all instances of a series.

use std::cmp::Reverse;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dicom::{InstanceMetadata, TilingMode};
use crate::error::IngestionError;

use super::frame::FrameReference;
use super::level::LevelIndex;
use super::selector::DownsampleSelector;

// =============================================================================
// Level Information
// =============================================================================

/// Snapshot of one pyramid level, suitable for display or JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Tiles that have a frame
    pub assigned_tiles: usize,

    /// Level 0 width divided by this level's width
    pub downsample: f64,

    pub tiling_mode: TilingMode,
}

/// Description of a whole pyramid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidSummary {
    pub study_uid: String,
    pub series_uid: String,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<LevelInfo>,
}

// =============================================================================
// Pyramid Index
// =============================================================================

/// Levels of a whole-slide image, full resolution first.
///
/// Built once when an image is opened and immutable afterwards, so it can be
/// shared across concurrent reads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PyramidIndex {
    levels: Vec<LevelIndex>,
    downsamples: Vec<f64>,
    study_uid: String,
    series_uid: String,
}

impl PyramidIndex {
    /// Group instances into levels and index their frames.
    ///
    /// Instances are ordered by width, largest first, and within one width by
    /// concatenation offset. Each distinct width becomes one level.
    pub fn open(instances: &[InstanceMetadata]) -> Result<Self, IngestionError> {
        let first = instances.first().ok_or(IngestionError::EmptySeries)?;

        if instances.iter().any(|i| i.series_uid != first.series_uid) {
            warn!(
                series_uid = %first.series_uid,
                "Instances from more than one series were supplied; indexing them together"
            );
        }

        let mut sorted: Vec<&InstanceMetadata> = instances.iter().collect();
        sorted.sort_by_key(|instance| {
            let offset = match instance.tiling_mode {
                TilingMode::Full => instance.frame_offset(),
                TilingMode::Sparse => 0,
            };
            (Reverse(instance.total_pixel_matrix_columns), offset)
        });

        // Identity follows the first full-resolution instance
        let (study_uid, series_uid) = (sorted[0].study_uid.clone(), sorted[0].series_uid.clone());

        let mut levels: Vec<LevelIndex> = Vec::new();
        for instance in sorted {
            match levels.last_mut() {
                Some(level) if level.width() == instance.total_pixel_matrix_columns => {
                    level.add_instance(instance)?
                }
                _ => levels.push(LevelIndex::new(instance)?),
            }
        }

        let base_width = f64::from(levels[0].width());
        let downsamples: Vec<f64> = levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                if index == 0 {
                    1.0
                } else {
                    base_width / f64::from(level.width())
                }
            })
            .collect();

        debug!(
            instances = instances.len(),
            levels = levels.len(),
            downsamples = ?downsamples,
            "Built pyramid index"
        );

        Ok(Self {
            levels,
            downsamples,
            study_uid,
            series_uid,
        })
    }

    /// Frame holding the 1-based tile (`tile_x`, `tile_y`) of `level`.
    pub fn get_frame(&self, tile_x: u32, tile_y: u32, level: usize) -> Option<&FrameReference> {
        self.levels.get(level)?.get_frame(tile_x, tile_y)
    }

    /// Level index to read for a requested downsample.
    pub fn select_level(&self, downsample: f64) -> usize {
        DownsampleSelector::new(&self.downsamples).select(downsample)
    }

    /// Downsample factor of every level; the first is always 1.0.
    pub fn downsamples(&self) -> &[f64] {
        &self.downsamples
    }

    fn base(&self) -> &LevelIndex {
        &self.levels[0]
    }

    pub fn width(&self) -> u32 {
        self.base().width()
    }

    pub fn height(&self) -> u32 {
        self.base().height()
    }

    pub fn tile_width(&self) -> u32 {
        self.base().tile_width()
    }

    pub fn tile_height(&self) -> u32 {
        self.base().tile_height()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&LevelIndex> {
        self.levels.get(index)
    }

    pub fn levels(&self) -> &[LevelIndex] {
        &self.levels
    }

    pub fn study_uid(&self) -> &str {
        &self.study_uid
    }

    pub fn series_uid(&self) -> &str {
        &self.series_uid
    }

    /// Snapshot of a level, or `None` if it does not exist.
    pub fn level_info(&self, index: usize) -> Option<LevelInfo> {
        let level = self.levels.get(index)?;
        Some(LevelInfo {
            width: level.width(),
            height: level.height(),
            tile_width: level.tile_width(),
            tile_height: level.tile_height(),
            tiles_x: level.tiles_x(),
            tiles_y: level.tiles_y(),
            assigned_tiles: level.assigned_tiles(),
            downsample: self.downsamples[index],
            tiling_mode: level.tiling_mode(),
        })
    }

    pub fn summary(&self) -> PyramidSummary {
        PyramidSummary {
            study_uid: self.study_uid.clone(),
            series_uid: self.series_uid.clone(),
            width: self.width(),
            height: self.height(),
            levels: (0..self.levels.len())
                .filter_map(|index| self.level_info(index))
                .collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
