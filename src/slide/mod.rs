//! Open-image handle.
//!
//! A [`DicomSlide`] ties together the pieces of one opened image:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               DicomSlide                │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           RegionCompositor              │
//! │   (fetch pool, optional tile cache)     │
//! └──────────┬──────────────────┬───────────┘
//!            │                  │
//!            ▼                  ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │   PyramidIndex     │ │   FrameFetcher     │
//! │  (immutable, Arc)  │ │  (S3, directory)   │
//! └────────────────────┘ └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use wsi_dicom_reader::{DicomSlide, DirectoryFrameFetcher, ReaderConfig, RegionRequest};
//!
//! let fetcher = Arc::new(DirectoryFrameFetcher::new("frames/"));
//! let slide = DicomSlide::open_file("series.json", fetcher, ReaderConfig::default()).await?;
//!
//! match slide.read_region(&RegionRequest::new(0, 0, 1024, 1024, 4.0)).await? {
//!     RegionRead::Complete(image) => image.save("region.png")?,
//!     RegionRead::Hole(hole) => println!("not available yet: {}", hole),
//! }
//! ```

mod handle;

pub use handle::DicomSlide;
