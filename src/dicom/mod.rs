//! DICOM metadata ingestion.
//!
//! Whole-slide images in DICOM are split into one instance per pyramid level
//! (or several, when a level is concatenated), each holding many frames that
//! are the tiles of that level. This module decodes the instance attributes
//! that describe tile addressing into plain [`InstanceMetadata`] records.
//!
//! Two addressing conventions exist:
//!
//! - **TILED_FULL**: frames fill the tile grid in row-major order; a
//!   concatenated instance starts at its ConcatenationFrameOffsetNumber.
//! - **TILED_SPARSE**: every frame names its own (column, row) through the
//!   per-frame functional groups.

mod metadata;
mod tags;

pub use metadata::{load_series_metadata, parse_series_metadata, InstanceMetadata, TilingMode};
pub use tags::{DicomTag, TILED_FULL, TILED_SPARSE};
