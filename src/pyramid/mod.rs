//! Pyramid tile index.
//!
//! A whole-slide image is stored as a pyramid of resolution levels. This
//! module rebuilds, from instance metadata alone, which frame of which
//! instance holds each tile of each level:
//!
//! - [`FrameReference`] names one tile's storage location
//! - [`LevelIndex`] maps the 1-based tile grid of one level to frames
//! - [`PyramidIndex`] orders levels and computes their downsample factors
//! - [`DownsampleSelector`] picks the level to serve a requested scale from

mod frame;
mod index;
mod level;
mod selector;

pub use frame::FrameReference;
pub use index::{LevelInfo, PyramidIndex, PyramidSummary};
pub use level::{LevelGeometry, LevelIndex};
pub use selector::DownsampleSelector;
