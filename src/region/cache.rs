//! Cache of decoded tiles.
//!
//! Neighbouring region reads overlap heavily, so decoded tiles are kept in an
//! LRU keyed by [`FrameReference`] and bounded by decoded size
//! (`width * height * 3` bytes per tile).

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbImage;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::pyramid::FrameReference;

/// Default cache capacity: 256MB of decoded pixels
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Decoded size of a tile in bytes.
#[inline]
fn tile_bytes(tile: &RgbImage) -> usize {
    tile.as_raw().len()
}

struct CacheState {
    tiles: LruCache<FrameReference, Arc<RgbImage>>,
    size: usize,
}

/// LRU cache of decoded tiles with size-based capacity.
///
/// Shared between fetch tasks through an `Arc`; a single mutex guards both
/// the entries and the running size.
pub struct TileCache {
    state: Mutex<CacheState>,
    max_size: usize,
}

impl TileCache {
    /// Create a cache holding up to `max_size` bytes of decoded pixels.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded by both bytes and entry count.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                tiles: LruCache::new(entries),
                size: 0,
            }),
            max_size,
        }
    }

    /// Get a tile, marking it as recently used.
    pub async fn get(&self, frame: &FrameReference) -> Option<Arc<RgbImage>> {
        let mut state = self.state.lock().await;
        state.tiles.get(frame).cloned()
    }

    /// Check for a tile without updating LRU order.
    pub async fn contains(&self, frame: &FrameReference) -> bool {
        self.state.lock().await.tiles.contains(frame)
    }

    /// Store a tile, evicting least-recently-used tiles while over capacity.
    ///
    /// A tile larger than the whole capacity is not stored.
    pub async fn put(&self, frame: FrameReference, tile: Arc<RgbImage>) {
        let tile_size = tile_bytes(&tile);
        if tile_size > self.max_size {
            return;
        }

        let mut state = self.state.lock().await;
        let state = &mut *state;

        // push returns the replaced entry or the one evicted for entry count
        if let Some((_, old)) = state.tiles.push(frame, tile) {
            state.size = state.size.saturating_sub(tile_bytes(&old));
        }
        state.size += tile_size;

        while state.size > self.max_size {
            match state.tiles.pop_lru() {
                Some((_, evicted)) => {
                    state.size = state.size.saturating_sub(tile_bytes(&evicted));
                }
                None => break,
            }
        }
    }

    /// Remove a tile, returning it if it was cached.
    pub async fn remove(&self, frame: &FrameReference) -> Option<Arc<RgbImage>> {
        let mut state = self.state.lock().await;
        let removed = state.tiles.pop(frame)?;
        state.size = state.size.saturating_sub(tile_bytes(&removed));
        Some(removed)
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.tiles.clear();
        state.size = 0;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.tiles.is_empty()
    }

    /// Current decoded size of all cached tiles in bytes.
    pub async fn size(&self) -> usize {
        self.state.lock().await.size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }
}

// =============================================================================
// Tests
// =============================================================================
