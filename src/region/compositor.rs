//! Region reads: resolve the covering tiles, fetch them concurrently and
//! composite them into one raster.
//!
//! # Hole policy
//!
//! The frame store is eventually consistent, so a frame that is missing now
//! may appear later. By default a read with any missing tile yields
//! [`RegionRead::Hole`] and no partial raster; the caller decides whether and
//! when to retry. [`HolePolicy::Placeholder`] instead paints a flat colour
//! over each missing tile and is meant for diagnostics only.

use std::fmt;
use std::sync::Arc;

use image::{imageops, Rgb, RgbImage};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::error::{FetchError, RegionError};
use crate::io::FrameFetcher;
use crate::pyramid::{FrameReference, PyramidIndex};

use super::cache::TileCache;
use super::pool::FetchPool;
use super::request::{RegionRequest, TileGrid};

const OUTLINE_COLOUR: Rgb<u8> = Rgb([0, 0, 0]);

// =============================================================================
// Outcomes
// =============================================================================

/// What to do when some tiles of a region cannot be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HolePolicy {
    /// Return a [`Hole`] for the whole read
    #[default]
    FailWhole,

    /// Paint a placeholder colour over missing tiles
    Placeholder,
}

/// Why one tile is missing from a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// The pyramid has no frame at this coordinate
    Unassigned,

    /// The frame exists but fetching it failed
    FetchFailed(FetchError),
}

/// A tile that could not be produced, at its 1-based level coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTile {
    pub tile_x: u32,
    pub tile_y: u32,
    pub reason: MissingReason,
}

/// Why a read produced no raster.
#[derive(Debug, Clone, PartialEq)]
pub enum HoleCause {
    MissingTiles(Vec<MissingTile>),
    TimedOut,
}

/// A read that has no result yet.
///
/// Not an error: the store may still be converging and the same read can
/// succeed later.
#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    pub level: usize,
    pub scale: f64,
    pub cause: HoleCause,
}

impl Hole {
    /// Holes are always worth retrying later.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Tiles that were missing; empty when the read timed out.
    pub fn missing_tiles(&self) -> &[MissingTile] {
        match &self.cause {
            HoleCause::MissingTiles(tiles) => tiles,
            HoleCause::TimedOut => &[],
        }
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            HoleCause::MissingTiles(tiles) => write!(
                f,
                "{} tile(s) missing at level {} (downsample {})",
                tiles.len(),
                self.level,
                self.scale
            ),
            HoleCause::TimedOut => write!(
                f,
                "read timed out at level {} (downsample {})",
                self.level, self.scale
            ),
        }
    }
}

/// Result of a region read.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionRead {
    Complete(RgbImage),
    Hole(Hole),
}

impl RegionRead {
    pub fn is_complete(&self) -> bool {
        matches!(self, RegionRead::Complete(_))
    }

    pub fn image(&self) -> Option<&RgbImage> {
        match self {
            RegionRead::Complete(image) => Some(image),
            RegionRead::Hole(_) => None,
        }
    }

    pub fn into_image(self) -> Option<RgbImage> {
        match self {
            RegionRead::Complete(image) => Some(image),
            RegionRead::Hole(_) => None,
        }
    }

    pub fn hole(&self) -> Option<&Hole> {
        match self {
            RegionRead::Complete(_) => None,
            RegionRead::Hole(hole) => Some(hole),
        }
    }
}

/// Per-slot result of the fetch phase.
#[derive(Debug, Clone)]
pub enum TileOutcome {
    Fetched(Arc<RgbImage>),
    Missing(MissingReason),
}

type FetchHandle = JoinHandle<Result<Arc<RgbImage>, FetchError>>;

enum Slot {
    Ready(TileOutcome),
    Pending(FetchHandle),
}

// =============================================================================
// Region Compositor
// =============================================================================

/// Serves region reads for one open image.
///
/// Owns the image's fetch pool (and tile cache, if enabled). The pool is
/// closed by [`close`](Self::close) or when the compositor is dropped.
pub struct RegionCompositor<F: ?Sized> {
    pyramid: Arc<PyramidIndex>,
    fetcher: Arc<F>,
    pool: FetchPool,
    cache: Option<Arc<TileCache>>,
    config: ReaderConfig,
}

impl<F> RegionCompositor<F>
where
    F: FrameFetcher + ?Sized + 'static,
{
    pub fn new(pyramid: Arc<PyramidIndex>, fetcher: Arc<F>, config: ReaderConfig) -> Self {
        let cache = (config.tile_cache_capacity > 0)
            .then(|| Arc::new(TileCache::with_capacity(config.tile_cache_capacity)));

        Self {
            pyramid,
            fetcher,
            pool: FetchPool::new(config.concurrency),
            cache,
            config,
        }
    }

    /// Read a region.
    ///
    /// Fails only for invalid requests or a closed compositor. Missing tiles
    /// and timeouts come back as `Ok(RegionRead::Hole(..))` under the default
    /// policy.
    pub async fn read(&self, request: &RegionRequest) -> Result<RegionRead, RegionError> {
        if self.pool.is_closed() {
            return Err(RegionError::Closed);
        }
        request.validate(self.pyramid.width(), self.pyramid.height())?;

        let grid = TileGrid::plan(&self.pyramid, request);
        debug!(
            x = request.x,
            y = request.y,
            width = request.width,
            height = request.height,
            downsample = request.downsample,
            level = grid.level,
            scale = grid.scale,
            base_tile_x = grid.base_tile_x + 1,
            base_tile_y = grid.base_tile_y + 1,
            tiles = grid.len(),
            "Reading region"
        );

        let outcomes = match self.config.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.fetch_tiles(&grid)).await {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    warn!(
                        level = grid.level,
                        timeout_ms = limit.as_millis() as u64,
                        "Region read timed out"
                    );
                    return Ok(RegionRead::Hole(Hole {
                        level: grid.level,
                        scale: grid.scale,
                        cause: HoleCause::TimedOut,
                    }));
                }
            },
            None => self.fetch_tiles(&grid).await,
        };

        Ok(self.compose(request, &grid, outcomes))
    }

    /// Issue every fetch first, then join them in slot order.
    async fn fetch_tiles(&self, grid: &TileGrid) -> Vec<TileOutcome> {
        let mut slots = Vec::with_capacity(grid.len());

        for (dx, dy) in grid.slots() {
            let (tile_x, tile_y) = grid.tile_at(dx, dy);
            let Some(frame) = self.pyramid.get_frame(tile_x + 1, tile_y + 1, grid.level) else {
                warn!(
                    tile_x = tile_x + 1,
                    tile_y = tile_y + 1,
                    level = grid.level,
                    "No frame for tile"
                );
                slots.push(Slot::Ready(TileOutcome::Missing(MissingReason::Unassigned)));
                continue;
            };

            if let Some(cache) = &self.cache {
                if let Some(tile) = cache.get(frame).await {
                    slots.push(Slot::Ready(TileOutcome::Fetched(tile)));
                    continue;
                }
            }

            slots.push(Slot::Pending(self.spawn_fetch(frame.clone())));
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            let outcome = match slot {
                Slot::Ready(outcome) => outcome,
                Slot::Pending(handle) => match handle.await {
                    Ok(Ok(tile)) => TileOutcome::Fetched(tile),
                    Ok(Err(err)) => TileOutcome::Missing(MissingReason::FetchFailed(err)),
                    Err(err) => TileOutcome::Missing(MissingReason::FetchFailed(
                        FetchError::Task(err.to_string()),
                    )),
                },
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    fn spawn_fetch(&self, frame: FrameReference) -> FetchHandle {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = self.cache.clone();

        self.pool.spawn(async move {
            let tile = Arc::new(
                fetcher
                    .fetch(frame.instance_uid(), frame.frame_index())
                    .await?,
            );
            if let Some(cache) = cache {
                cache.put(frame, Arc::clone(&tile)).await;
            }
            Ok::<_, FetchError>(tile)
        })
    }

    fn compose(
        &self,
        request: &RegionRequest,
        grid: &TileGrid,
        outcomes: Vec<TileOutcome>,
    ) -> RegionRead {
        let missing: Vec<MissingTile> = grid
            .slots()
            .zip(&outcomes)
            .filter_map(|((dx, dy), outcome)| match outcome {
                TileOutcome::Fetched(_) => None,
                TileOutcome::Missing(reason) => {
                    let (tile_x, tile_y) = grid.tile_at(dx, dy);
                    if let MissingReason::FetchFailed(err) = reason {
                        warn!(
                            tile_x = tile_x + 1,
                            tile_y = tile_y + 1,
                            level = grid.level,
                            error = %err,
                            "Tile fetch failed"
                        );
                    }
                    Some(MissingTile {
                        tile_x: tile_x + 1,
                        tile_y: tile_y + 1,
                        reason: reason.clone(),
                    })
                }
            })
            .collect();

        if !missing.is_empty() && self.config.hole_policy == HolePolicy::FailWhole {
            debug!(
                missing = missing.len(),
                level = grid.level,
                "Returning hole for region"
            );
            return RegionRead::Hole(Hole {
                level: grid.level,
                scale: grid.scale,
                cause: HoleCause::MissingTiles(missing),
            });
        }

        let mut raster = RgbImage::new(grid.raster_width(), grid.raster_height());
        for ((dx, dy), outcome) in grid.slots().zip(outcomes) {
            let x = dx * grid.tile_width;
            let y = dy * grid.tile_height;

            match outcome {
                TileOutcome::Fetched(tile) => {
                    imageops::replace(&mut raster, tile.as_ref(), i64::from(x), i64::from(y));
                }
                TileOutcome::Missing(_) => {
                    let colour = self.placeholder_colour(request, x, y, grid.scale);
                    fill_rect(&mut raster, x, y, grid.tile_width, grid.tile_height, colour);
                }
            }

            if self.config.debug_outlines {
                outline_rect(&mut raster, x, y, grid.tile_width, grid.tile_height, OUTLINE_COLOUR);
            }
        }

        if !missing.is_empty() {
            warn!(
                count = missing.len(),
                level = grid.level,
                "Painted placeholder tiles"
            );
        }

        RegionRead::Complete(raster)
    }

    /// Colour for a placeholder at raster offset (`x`, `y`).
    ///
    /// Red and green follow the tile's level-0 position across the image,
    /// blue follows the scale, so neighbouring placeholders are told apart.
    fn placeholder_colour(&self, request: &RegionRequest, x: u32, y: u32, scale: f64) -> Rgb<u8> {
        let channel = |value: f64| (value.clamp(0.0, 1.0) * 255.0).round() as u8;

        let r = (f64::from(request.x) + f64::from(x) * scale) / f64::from(self.pyramid.width());
        let g = (f64::from(request.y) + f64::from(y) * scale) / f64::from(self.pyramid.height());
        let b = scale / 256.0;

        Rgb([channel(r), channel(g), channel(b)])
    }

    /// Stop accepting reads and release the fetch pool.
    ///
    /// In-flight fetches finish in the background; queued ones are dropped.
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn pyramid(&self) -> &Arc<PyramidIndex> {
        &self.pyramid
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&TileCache> {
        self.cache.as_deref()
    }
}

impl<F: ?Sized> Drop for RegionCompositor<F> {
    fn drop(&mut self) {
        self.pool.close();
    }
}

/// One-shot region read with the default configuration.
pub async fn read_region<F>(
    pyramid: Arc<PyramidIndex>,
    fetcher: Arc<F>,
    request: &RegionRequest,
) -> Result<RegionRead, RegionError>
where
    F: FrameFetcher + ?Sized + 'static,
{
    RegionCompositor::new(pyramid, fetcher, ReaderConfig::default())
        .read(request)
        .await
}

// =============================================================================
// Drawing
// =============================================================================

fn fill_rect(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, colour: Rgb<u8>) {
    let x_end = (x + width).min(image.width());
    let y_end = (y + height).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, colour);
        }
    }
}

/// 1-pixel border along the inside edge of a rectangle.
fn outline_rect(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, colour: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    let right = x + width - 1;
    let bottom = y + height - 1;

    for px in x..=right {
        put_clipped(image, px, y, colour);
        put_clipped(image, px, bottom, colour);
    }
    for py in y..=bottom {
        put_clipped(image, x, py, colour);
        put_clipped(image, right, py, colour);
    }
}

#[inline]
fn put_clipped(image: &mut RgbImage, x: u32, y: u32, colour: Rgb<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, colour);
    }
}

// =============================================================================
// Tests
// =============================================================================
