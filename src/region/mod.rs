//! Region reads over a pyramid index.
//!
//! A read maps a level-0 rectangle and downsample onto a block of tiles of
//! one level ([`TileGrid`]), fetches the tiles concurrently on a bounded
//! [`FetchPool`], and composites them into a single raster
//! ([`RegionCompositor`]). Decoded tiles may be kept in a [`TileCache`].

mod cache;
mod compositor;
mod encoder;
mod pool;
mod request;

pub use cache::{TileCache, DEFAULT_TILE_CACHE_CAPACITY};
pub use compositor::{
    read_region, Hole, HoleCause, HolePolicy, MissingReason, MissingTile, RegionCompositor,
    RegionRead, TileOutcome,
};
pub use encoder::{
    clamp_quality, encode_region, is_valid_quality, OutputFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use pool::{default_concurrency, FetchPool, MIN_FETCH_CONCURRENCY};
pub use request::{RegionRequest, TileGrid};
