//! # WSI DICOM Reader
//!
//! Region reads for DICOM whole-slide images held in a remote frame store.
//!
//! A DICOM whole-slide image is a series of instances, one or more per
//! pyramid level, whose frames are the tiles of that level. This library
//! rebuilds the tile addressing of every level from instance metadata alone
//! and serves arbitrary pixel regions by fetching the covering tiles
//! concurrently and compositing them.
//!
//! ## Features
//!
//! - **Both tiling conventions**: TILED_FULL (row-major frames, split across
//!   concatenated instances) and TILED_SPARSE (explicit per-frame positions)
//! - **Nearest-level reads**: any downsample is served from the closest level
//! - **Bounded fan-out**: one task per tile on a per-image pool
//! - **Holes, not partial images**: missing tiles yield a retryable
//!   [`Hole`] instead of a half-filled raster
//! - **Pluggable stores**: S3 (DICOMweb key layout) and local directories
//!
//! ## Architecture
//!
//! - [`dicom`] - DICOM JSON metadata decoding
//! - [`pyramid`] - Tile index per level and level selection
//! - [`io`] - Frame fetchers
//! - [`region`] - Region planning, fetch pool, compositing and encoding
//! - [`slide`] - Open-image handle
//! - [`config`] - Reader and CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsi_dicom_reader::{
//!     DicomSlide, DirectoryFrameFetcher, ReaderConfig, RegionRead, RegionRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(DirectoryFrameFetcher::new("frames"));
//!     let slide = DicomSlide::open_file("series.json", fetcher, ReaderConfig::default()).await?;
//!
//!     let request = RegionRequest::new(0, 0, 2048, 2048, 4.0);
//!     match slide.read_region(&request).await? {
//!         RegionRead::Complete(image) => println!("read {}x{}", image.width(), image.height()),
//!         RegionRead::Hole(hole) => println!("try again later: {}", hole),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dicom;
pub mod error;
pub mod io;
pub mod pyramid;
pub mod region;
pub mod slide;

// Re-export commonly used types
pub use config::{Cli, Command, FrameSource, InfoConfig, ReadConfig, ReaderConfig};
pub use dicom::{load_series_metadata, parse_series_metadata, InstanceMetadata, TilingMode};
pub use error::{EncodeError, FetchError, IngestionError, MetadataError, RegionError, SlideError};
pub use io::{create_s3_client, decode_frame, DirectoryFrameFetcher, FrameFetcher, S3FrameFetcher};
pub use pyramid::{
    DownsampleSelector, FrameReference, LevelGeometry, LevelIndex, LevelInfo, PyramidIndex,
    PyramidSummary,
};
pub use region::{
    encode_region, read_region, FetchPool, Hole, HoleCause, HolePolicy, MissingReason,
    MissingTile, OutputFormat, RegionCompositor, RegionRead, RegionRequest, TileCache, TileGrid,
};
pub use slide::DicomSlide;
