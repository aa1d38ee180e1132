//! Test utilities for integration tests.
//!
//! This module provides a mock frame store whose tiles carry a marker colour
//! identifying the frame they came from, plus builders for instance metadata
//! and DICOM JSON documents.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wsi_dicom_reader::error::FetchError;
use wsi_dicom_reader::io::FrameFetcher;
use wsi_dicom_reader::{InstanceMetadata, PyramidIndex};

// =============================================================================
// Tile Markers
// =============================================================================

/// Colour that identifies one frame of one instance.
pub fn marker(instance_uid: &str, frame_index: u32) -> Rgb<u8> {
    let uid_byte = instance_uid.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
    Rgb([
        (frame_index & 0xFF) as u8,
        ((frame_index >> 8) & 0xFF) as u8,
        uid_byte,
    ])
}

/// A flat tile filled with the frame's marker colour.
pub fn marker_tile(instance_uid: &str, frame_index: u32, tile_size: (u32, u32)) -> RgbImage {
    RgbImage::from_pixel(tile_size.0, tile_size.1, marker(instance_uid, frame_index))
}

// =============================================================================
// Mock Frame Fetcher
// =============================================================================

/// In-memory frame store that records its traffic.
///
/// Every frame exists unless marked missing or failing. Returned tiles are
/// filled with [`marker`] so tests can check where each tile landed.
pub struct MockFrameFetcher {
    tile_size: (u32, u32),
    missing: HashSet<(String, u32)>,
    failing: HashSet<(String, u32)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Mutex<Vec<(String, u32)>>,
}

impl MockFrameFetcher {
    pub fn new(tile_size: (u32, u32)) -> Self {
        Self {
            tile_size,
            missing: HashSet::new(),
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The store has not received this frame yet.
    pub fn with_missing(mut self, instance_uid: &str, frame_index: u32) -> Self {
        self.missing.insert((instance_uid.to_string(), frame_index));
        self
    }

    /// Fetching this frame fails with a network error.
    pub fn with_failing(mut self, instance_uid: &str, frame_index: u32) -> Self {
        self.failing.insert((instance_uid.to_string(), frame_index));
        self
    }

    /// Every fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl FrameFetcher for MockFrameFetcher {
    async fn fetch(&self, instance_uid: &str, frame_index: u32) -> Result<RgbImage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((instance_uid.to_string(), frame_index));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = (instance_uid.to_string(), frame_index);
        if self.missing.contains(&key) {
            return Err(FetchError::NotFound {
                instance: instance_uid.to_string(),
                frame: frame_index,
            });
        }
        if self.failing.contains(&key) {
            return Err(FetchError::Network("connection reset".to_string()));
        }

        Ok(marker_tile(instance_uid, frame_index, self.tile_size))
    }

    fn identifier(&self) -> &str {
        "mock://frames"
    }
}

// =============================================================================
// Metadata Builders
// =============================================================================

/// Two-level pyramid in 256px tiles: 1024x768 (4x3 tiles) and 256x192.
pub fn two_level_series() -> Vec<InstanceMetadata> {
    vec![
        InstanceMetadata::tiled_full("1.2.3.1", (1024, 768), (256, 256), 12)
            .with_series("1.2", "1.2.3"),
        InstanceMetadata::tiled_full("1.2.3.2", (256, 192), (256, 256), 1)
            .with_series("1.2", "1.2.3"),
    ]
}

pub fn open_pyramid(instances: &[InstanceMetadata]) -> Arc<PyramidIndex> {
    Arc::new(PyramidIndex::open(instances).unwrap())
}

/// DICOM JSON for a TILED_FULL instance.
pub fn full_instance_json(
    sop: &str,
    (width, height): (u32, u32),
    (tile_width, tile_height): (u32, u32),
    frames: u32,
    offset: Option<u32>,
) -> Value {
    let mut value = json!({
        "0020000D": {"vr": "UI", "Value": ["1.2"]},
        "0020000E": {"vr": "UI", "Value": ["1.2.3"]},
        "00080018": {"vr": "UI", "Value": [sop]},
        "00480006": {"vr": "UL", "Value": [width]},
        "00480007": {"vr": "UL", "Value": [height]},
        "00280011": {"vr": "US", "Value": [tile_width]},
        "00280010": {"vr": "US", "Value": [tile_height]},
        "00280008": {"vr": "IS", "Value": [frames.to_string()]},
        "00209311": {"vr": "CS", "Value": ["TILED_FULL"]},
    });
    if let Some(offset) = offset {
        value["00209228"] = json!({"vr": "UL", "Value": [offset]});
    }
    value
}

/// DICOM JSON for a TILED_SPARSE instance with per-frame dimension indices.
pub fn sparse_instance_json(
    sop: &str,
    (width, height): (u32, u32),
    (tile_width, tile_height): (u32, u32),
    coordinates: &[(u32, u32)],
) -> Value {
    let frames: Vec<Value> = coordinates
        .iter()
        .map(|(column, row)| {
            json!({
                "00209111": {"vr": "SQ", "Value": [
                    {"00209157": {"vr": "UL", "Value": [column, row]}}
                ]}
            })
        })
        .collect();

    json!({
        "0020000D": {"vr": "UI", "Value": ["1.2"]},
        "0020000E": {"vr": "UI", "Value": ["1.2.3"]},
        "00080018": {"vr": "UI", "Value": [sop]},
        "00480006": {"vr": "UL", "Value": [width]},
        "00480007": {"vr": "UL", "Value": [height]},
        "00280011": {"vr": "US", "Value": [tile_width]},
        "00280010": {"vr": "US", "Value": [tile_height]},
        "00280008": {"vr": "IS", "Value": [coordinates.len().to_string()]},
        "00209311": {"vr": "CS", "Value": ["TILED_SPARSE"]},
        "52009230": {"vr": "SQ", "Value": frames},
    })
}

/// Serialize instances as a series metadata document.
pub fn series_document(instances: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&Value::Array(instances)).unwrap()
}

/// All 1-based coordinates of a `tiles_x` by `tiles_y` grid, row-major.
pub fn grid_coordinates(tiles_x: u32, tiles_y: u32) -> Vec<(u32, u32)> {
    (1..=tiles_y)
        .flat_map(|row| (1..=tiles_x).map(move |column| (column, row)))
        .collect()
}

/// Deterministic permutation of a list (no RNG dependency).
pub fn shuffled<T: Clone>(items: &[T], seed: usize) -> Vec<T> {
    let mut out = items.to_vec();
    let len = out.len();
    if len < 2 {
        return out;
    }
    let mut state = (seed as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    for i in (1..len).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = ((state >> 33) % (i as u64 + 1)) as usize;
        out.swap(i, j);
    }
    out
}
