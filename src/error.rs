use thiserror::Error;

/// Errors raised while building a pyramid index from instance metadata.
///
/// All of these are fatal to opening the image; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// No instances were supplied for the series
    #[error("Empty series: no instances supplied")]
    EmptySeries,

    /// An instance does not share the geometry of the level it was grouped into
    #[error(
        "Geometry mismatch for instance {instance}: level is {expected}, instance is {found}"
    )]
    GeometryMismatch {
        instance: String,
        expected: String,
        found: String,
    },

    /// Two frames claim the same tile coordinate
    #[error("Duplicate tile ({tile_x}, {tile_y}) from instance {instance} frame {frame}")]
    DuplicateTile {
        instance: String,
        frame: u32,
        tile_x: u32,
        tile_y: u32,
    },

    /// A frame lands outside the level's tile grid
    #[error(
        "Tile ({tile_x}, {tile_y}) from instance {instance} frame {frame} is outside the {tiles_x}x{tiles_y} grid"
    )]
    TileOutOfRange {
        instance: String,
        frame: u32,
        tile_x: u32,
        tile_y: u32,
        tiles_x: u32,
        tiles_y: u32,
    },

    /// The instance declares a geometry no tile grid can be built from
    #[error("Invalid geometry for instance {instance}: {reason}")]
    InvalidGeometry { instance: String, reason: String },
}

/// Errors fetching a single frame from the remote store.
///
/// These never reach the caller of a region read directly; the compositor
/// folds them into a [`crate::region::Hole`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network or storage service failure
    #[error("Network error: {0}")]
    Network(String),

    /// The store does not (yet) have this frame
    #[error("Frame not found: {instance} frame {frame}")]
    NotFound { instance: String, frame: u32 },

    /// The frame bytes could not be decoded into a raster
    #[error("Failed to decode frame: {message}")]
    Decode { message: String },

    /// The fetch pool was closed before the fetch could start
    #[error("Fetch pool closed")]
    Closed,

    /// The fetch task panicked or was aborted
    #[error("Fetch task failed: {0}")]
    Task(String),
}

/// Errors surfaced synchronously by a region read, before any fetch is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// Rectangle is empty or extends past the level-0 image
    #[error(
        "Invalid region {width}x{height} at ({x}, {y}) for image of {image_width}x{image_height}"
    )]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Downsample must be finite and positive
    #[error("Invalid downsample: {0}")]
    InvalidDownsample(f64),

    /// The image was closed and its fetch pool released
    #[error("Image is closed")]
    Closed,
}

/// Errors decoding DICOM JSON metadata into instance records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Document is not valid JSON or has the wrong shape
    #[error("JSON error: {0}")]
    Json(String),

    /// Metadata file could not be read
    #[error("I/O error: {0}")]
    Io(String),

    /// Required attribute is missing
    #[error("Missing required tag {tag} ({name})")]
    MissingTag { tag: &'static str, name: &'static str },

    /// Attribute is present but has an unusable value
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Json(err.to_string())
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err.to_string())
    }
}

/// Errors encoding a composed region for output.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// Unsupported output format
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Encoder failure
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
}

/// Errors opening a slide from a metadata document.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// Metadata could not be read or decoded
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Instances do not form a valid pyramid
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Reader configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),
}
