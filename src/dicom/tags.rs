//! DICOM attribute vocabulary for whole-slide ingestion.
//!
//! Only the attributes needed to rebuild tile addressing are defined here.
//! In DICOM JSON (PS3.18 F.2) each attribute is keyed by its tag written as
//! eight upper-case hex digits, e.g. `"00480006"`.

// =============================================================================
// DICOM Tags
// =============================================================================

/// DICOM attributes read while ingesting instance metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DicomTag {
    // -------------------------------------------------------------------------
    // Identification
    // -------------------------------------------------------------------------
    /// Study Instance UID
    StudyInstanceUid,

    /// Series Instance UID
    SeriesInstanceUid,

    /// SOP Instance UID, the identifier frames are fetched by
    SopInstanceUid,

    // -------------------------------------------------------------------------
    // Level and Tile Geometry
    // -------------------------------------------------------------------------
    /// Width of the whole level in pixels
    TotalPixelMatrixColumns,

    /// Height of the whole level in pixels
    TotalPixelMatrixRows,

    /// Tile height in pixels
    Rows,

    /// Tile width in pixels
    Columns,

    /// Number of frames (tiles) stored in this instance
    NumberOfFrames,

    // -------------------------------------------------------------------------
    // Tile Addressing
    // -------------------------------------------------------------------------
    /// TILED_FULL or TILED_SPARSE
    DimensionOrganizationType,

    /// Flattened frame offset of this instance within a concatenation
    ConcatenationFrameOffsetNumber,

    /// One item per frame
    PerFrameFunctionalGroupsSequence,

    /// Per-frame content, holds the dimension index values
    FrameContentSequence,

    /// Per-frame (column, row) tile index, 1-based
    DimensionIndexValues,

    /// Per-frame plane position on the slide
    PlanePositionSlideSequence,

    /// 1-based pixel column of the frame's top-left corner
    ColumnPositionInTotalImagePixelMatrix,

    /// 1-based pixel row of the frame's top-left corner
    RowPositionInTotalImagePixelMatrix,
}

impl DicomTag {
    /// The DICOM JSON key for this attribute.
    pub const fn key(self) -> &'static str {
        match self {
            DicomTag::StudyInstanceUid => "0020000D",
            DicomTag::SeriesInstanceUid => "0020000E",
            DicomTag::SopInstanceUid => "00080018",
            DicomTag::TotalPixelMatrixColumns => "00480006",
            DicomTag::TotalPixelMatrixRows => "00480007",
            DicomTag::Rows => "00280010",
            DicomTag::Columns => "00280011",
            DicomTag::NumberOfFrames => "00280008",
            DicomTag::DimensionOrganizationType => "00209311",
            DicomTag::ConcatenationFrameOffsetNumber => "00209228",
            DicomTag::PerFrameFunctionalGroupsSequence => "52009230",
            DicomTag::FrameContentSequence => "00209111",
            DicomTag::DimensionIndexValues => "00209157",
            DicomTag::PlanePositionSlideSequence => "0048021A",
            DicomTag::ColumnPositionInTotalImagePixelMatrix => "0048021E",
            DicomTag::RowPositionInTotalImagePixelMatrix => "0048021F",
        }
    }

    /// Attribute keyword, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            DicomTag::StudyInstanceUid => "StudyInstanceUID",
            DicomTag::SeriesInstanceUid => "SeriesInstanceUID",
            DicomTag::SopInstanceUid => "SOPInstanceUID",
            DicomTag::TotalPixelMatrixColumns => "TotalPixelMatrixColumns",
            DicomTag::TotalPixelMatrixRows => "TotalPixelMatrixRows",
            DicomTag::Rows => "Rows",
            DicomTag::Columns => "Columns",
            DicomTag::NumberOfFrames => "NumberOfFrames",
            DicomTag::DimensionOrganizationType => "DimensionOrganizationType",
            DicomTag::ConcatenationFrameOffsetNumber => "ConcatenationFrameOffsetNumber",
            DicomTag::PerFrameFunctionalGroupsSequence => "PerFrameFunctionalGroupsSequence",
            DicomTag::FrameContentSequence => "FrameContentSequence",
            DicomTag::DimensionIndexValues => "DimensionIndexValues",
            DicomTag::PlanePositionSlideSequence => "PlanePositionSlideSequence",
            DicomTag::ColumnPositionInTotalImagePixelMatrix => {
                "ColumnPositionInTotalImagePixelMatrix"
            }
            DicomTag::RowPositionInTotalImagePixelMatrix => "RowPositionInTotalImagePixelMatrix",
        }
    }

    /// Look up a tag from its DICOM JSON key.
    ///
    /// Keys are matched case-insensitively. Returns `None` for attributes
    /// this crate does not use.
    pub fn from_key(key: &str) -> Option<Self> {
        ALL_TAGS
            .iter()
            .copied()
            .find(|tag| tag.key().eq_ignore_ascii_case(key))
    }
}

const ALL_TAGS: [DicomTag; 16] = [
    DicomTag::StudyInstanceUid,
    DicomTag::SeriesInstanceUid,
    DicomTag::SopInstanceUid,
    DicomTag::TotalPixelMatrixColumns,
    DicomTag::TotalPixelMatrixRows,
    DicomTag::Rows,
    DicomTag::Columns,
    DicomTag::NumberOfFrames,
    DicomTag::DimensionOrganizationType,
    DicomTag::ConcatenationFrameOffsetNumber,
    DicomTag::PerFrameFunctionalGroupsSequence,
    DicomTag::FrameContentSequence,
    DicomTag::DimensionIndexValues,
    DicomTag::PlanePositionSlideSequence,
    DicomTag::ColumnPositionInTotalImagePixelMatrix,
    DicomTag::RowPositionInTotalImagePixelMatrix,
];

/// DimensionOrganizationType value for implicit row-major tiling.
pub const TILED_FULL: &str = "TILED_FULL";

/// DimensionOrganizationType value for explicitly addressed tiles.
pub const TILED_SPARSE: &str = "TILED_SPARSE";

// =============================================================================
// Tests
// =============================================================================
