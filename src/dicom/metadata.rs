//! Instance metadata and its decoding from DICOM JSON.
//!
//! A series is described by one JSON object per instance, as returned by a
//! DICOMweb `.../series/{uid}/metadata` request. Each object is decoded once
//! into a plain [`InstanceMetadata`]; nothing downstream sees DICOM JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MetadataError;

use super::tags::{DicomTag, TILED_FULL};

// =============================================================================
// Tiling Mode
// =============================================================================

/// How frames of an instance map onto tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TilingMode {
    /// TILED_FULL: frames fill the tile grid in row-major order
    Full,

    /// TILED_SPARSE: each frame carries its own (column, row)
    Sparse,
}

impl std::fmt::Display for TilingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TilingMode::Full => write!(f, "TILED_FULL"),
            TilingMode::Sparse => write!(f, "TILED_SPARSE"),
        }
    }
}

// =============================================================================
// Instance Metadata
// =============================================================================

/// The attributes of one DICOM instance needed to index its frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub study_uid: String,
    pub series_uid: String,
    pub sop_instance_uid: String,

    /// Level width in pixels
    pub total_pixel_matrix_columns: u32,

    /// Level height in pixels
    pub total_pixel_matrix_rows: u32,

    /// Tile width in pixels
    pub columns: u32,

    /// Tile height in pixels
    pub rows: u32,

    pub tiling_mode: TilingMode,

    pub number_of_frames: u32,

    /// Row-major slot of this instance's first frame (FULL mode only)
    pub concatenation_frame_offset: Option<u32>,

    /// One 1-based (column, row) per frame (SPARSE mode only)
    pub per_frame_tile_coordinates: Vec<(u32, u32)>,
}

impl InstanceMetadata {
    /// Describe a TILED_FULL instance that covers its level from slot 0.
    pub fn tiled_full(
        sop_instance_uid: impl Into<String>,
        (width, height): (u32, u32),
        (tile_width, tile_height): (u32, u32),
        number_of_frames: u32,
    ) -> Self {
        Self {
            study_uid: String::new(),
            series_uid: String::new(),
            sop_instance_uid: sop_instance_uid.into(),
            total_pixel_matrix_columns: width,
            total_pixel_matrix_rows: height,
            columns: tile_width,
            rows: tile_height,
            tiling_mode: TilingMode::Full,
            number_of_frames,
            concatenation_frame_offset: None,
            per_frame_tile_coordinates: Vec::new(),
        }
    }

    /// Describe a TILED_SPARSE instance with one coordinate per frame.
    pub fn tiled_sparse(
        sop_instance_uid: impl Into<String>,
        (width, height): (u32, u32),
        (tile_width, tile_height): (u32, u32),
        coordinates: Vec<(u32, u32)>,
    ) -> Self {
        Self {
            study_uid: String::new(),
            series_uid: String::new(),
            sop_instance_uid: sop_instance_uid.into(),
            total_pixel_matrix_columns: width,
            total_pixel_matrix_rows: height,
            columns: tile_width,
            rows: tile_height,
            tiling_mode: TilingMode::Sparse,
            number_of_frames: coordinates.len() as u32,
            concatenation_frame_offset: None,
            per_frame_tile_coordinates: coordinates,
        }
    }

    /// Set the study and series this instance belongs to.
    pub fn with_series(
        mut self,
        study_uid: impl Into<String>,
        series_uid: impl Into<String>,
    ) -> Self {
        self.study_uid = study_uid.into();
        self.series_uid = series_uid.into();
        self
    }

    /// Set the concatenation frame offset.
    pub fn with_concatenation_offset(mut self, offset: u32) -> Self {
        self.concatenation_frame_offset = Some(offset);
        self
    }

    /// Concatenation offset, 0 when the instance is not part of a concatenation.
    #[inline]
    pub fn frame_offset(&self) -> u32 {
        self.concatenation_frame_offset.unwrap_or(0)
    }

    /// Decode one instance from a DICOM JSON object.
    pub fn from_dicom_json(value: &Value) -> Result<Self, MetadataError> {
        let object = value.as_object().ok_or_else(|| {
            MetadataError::Json("instance metadata must be a JSON object".to_string())
        })?;

        let study_uid = required_string(object, DicomTag::StudyInstanceUid)?;
        let series_uid = required_string(object, DicomTag::SeriesInstanceUid)?;
        let sop_instance_uid = required_string(object, DicomTag::SopInstanceUid)?;
        let width = required_u32(object, DicomTag::TotalPixelMatrixColumns)?;
        let height = required_u32(object, DicomTag::TotalPixelMatrixRows)?;
        let tile_width = required_u32(object, DicomTag::Columns)?;
        let tile_height = required_u32(object, DicomTag::Rows)?;

        let is_full = optional_string(object, DicomTag::DimensionOrganizationType)?
            .map(|kind| kind.trim() == TILED_FULL)
            .unwrap_or(false);

        let mut instance = if is_full {
            let frames = required_u32(object, DicomTag::NumberOfFrames)?;
            let mut instance = Self::tiled_full(
                sop_instance_uid,
                (width, height),
                (tile_width, tile_height),
                frames,
            );
            instance.concatenation_frame_offset =
                optional_u32(object, DicomTag::ConcatenationFrameOffsetNumber)?;
            instance
        } else {
            let coordinates = frame_coordinates(object, tile_width, tile_height)?;
            Self::tiled_sparse(
                sop_instance_uid,
                (width, height),
                (tile_width, tile_height),
                coordinates,
            )
        };

        instance.study_uid = study_uid;
        instance.series_uid = series_uid;
        Ok(instance)
    }
}

// =============================================================================
// Series Documents
// =============================================================================

/// Decode a series metadata document (a JSON array of instance objects).
pub fn parse_series_metadata(json: &[u8]) -> Result<Vec<InstanceMetadata>, MetadataError> {
    let document: Value = serde_json::from_slice(json)?;
    let instances = document.as_array().ok_or_else(|| {
        MetadataError::Json("series metadata must be a JSON array".to_string())
    })?;

    instances.iter().map(InstanceMetadata::from_dicom_json).collect()
}

/// Read and decode a series metadata document from disk.
pub async fn load_series_metadata(
    path: impl AsRef<Path>,
) -> Result<Vec<InstanceMetadata>, MetadataError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    parse_series_metadata(&bytes)
}

// =============================================================================
// Attribute Helpers
// =============================================================================

/// The `Value` array of an attribute, if present and non-empty.
fn values<'a>(object: &'a Map<String, Value>, tag: DicomTag) -> Option<&'a Vec<Value>> {
    object
        .get(tag.key())
        .and_then(|attr| attr.get("Value"))
        .and_then(Value::as_array)
        .filter(|values| !values.is_empty())
}

/// First item of a sequence attribute.
fn first_item<'a>(
    object: &'a Map<String, Value>,
    tag: DicomTag,
) -> Option<&'a Map<String, Value>> {
    values(object, tag)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
}

fn optional_string(
    object: &Map<String, Value>,
    tag: DicomTag,
) -> Result<Option<String>, MetadataError> {
    match values(object, tag).and_then(|values| values.first()) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(MetadataError::InvalidValue {
            name: tag.name(),
            message: format!("expected a string, got {}", other),
        }),
    }
}

fn required_string(object: &Map<String, Value>, tag: DicomTag) -> Result<String, MetadataError> {
    optional_string(object, tag)?.ok_or(MetadataError::MissingTag {
        tag: tag.key(),
        name: tag.name(),
    })
}

fn optional_u32(object: &Map<String, Value>, tag: DicomTag) -> Result<Option<u32>, MetadataError> {
    values(object, tag)
        .and_then(|values| values.first())
        .map(|value| to_u32(value, tag))
        .transpose()
}

fn required_u32(object: &Map<String, Value>, tag: DicomTag) -> Result<u32, MetadataError> {
    optional_u32(object, tag)?.ok_or(MetadataError::MissingTag {
        tag: tag.key(),
        name: tag.name(),
    })
}

/// Integer strings (IS) are sometimes sent as JSON strings; accept both.
fn to_u32(value: &Value, tag: DicomTag) -> Result<u32, MetadataError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| MetadataError::InvalidValue {
        name: tag.name(),
        message: format!("expected an unsigned integer, got {}", value),
    })
}

/// Per-frame (column, row) tile coordinates of a sparse instance.
fn frame_coordinates(
    object: &Map<String, Value>,
    tile_width: u32,
    tile_height: u32,
) -> Result<Vec<(u32, u32)>, MetadataError> {
    let frames = values(object, DicomTag::PerFrameFunctionalGroupsSequence).ok_or(
        MetadataError::MissingTag {
            tag: DicomTag::PerFrameFunctionalGroupsSequence.key(),
            name: DicomTag::PerFrameFunctionalGroupsSequence.name(),
        },
    )?;

    frames
        .iter()
        .map(|frame| {
            let frame = frame.as_object().ok_or_else(|| MetadataError::InvalidValue {
                name: DicomTag::PerFrameFunctionalGroupsSequence.name(),
                message: "sequence item is not an object".to_string(),
            })?;
            frame_coordinate(frame, tile_width, tile_height)
        })
        .collect()
}

fn frame_coordinate(
    frame: &Map<String, Value>,
    tile_width: u32,
    tile_height: u32,
) -> Result<(u32, u32), MetadataError> {
    if let Some(index) = first_item(frame, DicomTag::FrameContentSequence)
        .and_then(|content| values(content, DicomTag::DimensionIndexValues))
        .filter(|index| index.len() >= 2)
    {
        let column = to_u32(&index[0], DicomTag::DimensionIndexValues)?;
        let row = to_u32(&index[1], DicomTag::DimensionIndexValues)?;
        return Ok((column, row));
    }

    if let Some(position) = first_item(frame, DicomTag::PlanePositionSlideSequence) {
        let column = required_u32(position, DicomTag::ColumnPositionInTotalImagePixelMatrix)?;
        let row = required_u32(position, DicomTag::RowPositionInTotalImagePixelMatrix)?;
        if column == 0 || row == 0 || tile_width == 0 || tile_height == 0 {
            return Err(MetadataError::InvalidValue {
                name: DicomTag::PlanePositionSlideSequence.name(),
                message: format!("cannot derive a tile from position ({}, {})", column, row),
            });
        }
        // Plane positions are 1-based pixel offsets of the frame's corner
        return Ok(((column - 1) / tile_width + 1, (row - 1) / tile_height + 1));
    }

    Err(MetadataError::MissingTag {
        tag: DicomTag::DimensionIndexValues.key(),
        name: DicomTag::DimensionIndexValues.name(),
    })
}

// =============================================================================
// Tests
// =============================================================================
