//! Region read tests.
//!
//! Reads go through `RegionCompositor` against the mock frame store, whose
//! tiles are filled with a per-frame marker colour so every slot of the
//! output raster can be traced back to the frame it came from.

use std::sync::Arc;
use std::time::Duration;

use image::Rgb;
use wsi_dicom_reader::{
    read_region, FetchError, HoleCause, HolePolicy, InstanceMetadata, MissingReason,
    ReaderConfig, RegionCompositor, RegionError, RegionRequest,
};

use super::test_utils::{marker, open_pyramid, two_level_series, MockFrameFetcher};

const TILE: (u32, u32) = (256, 256);

fn compositor(
    fetcher: Arc<MockFrameFetcher>,
    config: ReaderConfig,
) -> RegionCompositor<MockFrameFetcher> {
    RegionCompositor::new(open_pyramid(&two_level_series()), fetcher, config)
}

// =============================================================================
// Tile Placement
// =============================================================================

#[tokio::test]
async fn test_full_level_read_places_every_tile() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    let image = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 1.0))
        .await
        .unwrap()
        .into_image()
        .unwrap();

    assert_eq!(image.dimensions(), (4 * 256, 3 * 256));
    for dy in 0..3 {
        for dx in 0..4 {
            let expected = marker("1.2.3.1", dy * 4 + dx + 1);
            // Check the tile's corners and centre
            for (px, py) in [(0, 0), (255, 0), (0, 255), (255, 255), (128, 128)] {
                assert_eq!(
                    image.get_pixel(dx * 256 + px, dy * 256 + py),
                    &expected,
                    "slot ({}, {})",
                    dx,
                    dy
                );
            }
        }
    }
    assert_eq!(fetcher.call_count(), 12);
}

#[tokio::test]
async fn test_sub_region_fetches_only_covering_tiles() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    // Origin snaps to tile (2, 1) 0-based; 512x256 spans two tiles
    let image = compositor
        .read(&RegionRequest::new(512, 256, 512, 256, 1.0))
        .await
        .unwrap()
        .into_image()
        .unwrap();

    assert_eq!(image.dimensions(), (512, 256));
    assert_eq!(image.get_pixel(10, 10), &marker("1.2.3.1", 7));
    assert_eq!(image.get_pixel(300, 10), &marker("1.2.3.1", 8));

    let mut requests = fetcher.requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![("1.2.3.1".to_string(), 7), ("1.2.3.1".to_string(), 8)]
    );
}

#[tokio::test]
async fn test_coarse_downsample_reads_coarser_level() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    let image = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 4.0))
        .await
        .unwrap()
        .into_image()
        .unwrap();

    assert_eq!(image.dimensions(), (256, 256));
    assert_eq!(image.get_pixel(0, 0), &marker("1.2.3.2", 1));
    assert_eq!(fetcher.requests(), vec![("1.2.3.2".to_string(), 1)]);
}

#[tokio::test]
async fn test_one_shot_read_region() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let read = read_region(
        open_pyramid(&two_level_series()),
        fetcher,
        &RegionRequest::new(0, 0, 256, 256, 1.0),
    )
    .await
    .unwrap();

    assert_eq!(read.image().unwrap().get_pixel(1, 1), &marker("1.2.3.1", 1));
}

// =============================================================================
// Holes
// =============================================================================

#[tokio::test]
async fn test_unassigned_tile_yields_hole_not_partial_raster() {
    // 2x2 sparse level with the bottom-right tile never stored
    let pyramid = open_pyramid(&[InstanceMetadata::tiled_sparse(
        "sparse",
        (512, 512),
        TILE,
        vec![(1, 1), (2, 1), (1, 2)],
    )]);
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = RegionCompositor::new(pyramid, fetcher, ReaderConfig::default());

    let read = compositor
        .read(&RegionRequest::new(0, 0, 512, 512, 1.0))
        .await
        .unwrap();

    assert!(!read.is_complete());
    assert!(read.image().is_none());
    let hole = read.hole().unwrap();
    assert!(hole.is_retryable());
    assert_eq!(hole.level, 0);
    assert_eq!(hole.missing_tiles().len(), 1);
    assert_eq!(hole.missing_tiles()[0].tile_x, 2);
    assert_eq!(hole.missing_tiles()[0].tile_y, 2);
    assert_eq!(hole.missing_tiles()[0].reason, MissingReason::Unassigned);
}

#[tokio::test]
async fn test_frame_not_yet_stored_yields_hole() {
    let fetcher = MockFrameFetcher::new(TILE)
        .with_missing("1.2.3.1", 6)
        .into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    let read = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 1.0))
        .await
        .unwrap();

    let hole = read.hole().unwrap();
    let missing = hole.missing_tiles();
    assert_eq!(missing.len(), 1);
    assert_eq!((missing[0].tile_x, missing[0].tile_y), (2, 2));
    assert_eq!(
        missing[0].reason,
        MissingReason::FetchFailed(FetchError::NotFound {
            instance: "1.2.3.1".to_string(),
            frame: 6,
        })
    );
    // All other tiles were still requested
    assert_eq!(fetcher.call_count(), 12);
}

#[tokio::test]
async fn test_failed_fetches_are_all_reported() {
    let fetcher = MockFrameFetcher::new(TILE)
        .with_failing("1.2.3.1", 1)
        .with_failing("1.2.3.1", 12)
        .into_arc();
    let compositor = compositor(fetcher, ReaderConfig::default());

    let read = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 1.0))
        .await
        .unwrap();

    let positions: Vec<(u32, u32)> = read
        .hole()
        .unwrap()
        .missing_tiles()
        .iter()
        .map(|tile| (tile.tile_x, tile.tile_y))
        .collect();
    assert_eq!(positions, vec![(1, 1), (4, 3)]);
}

#[tokio::test]
async fn test_placeholder_policy_paints_over_missing_tiles() {
    let fetcher = MockFrameFetcher::new(TILE)
        .with_missing("1.2.3.1", 2)
        .into_arc();
    let config = ReaderConfig::default().with_hole_policy(HolePolicy::Placeholder);
    let compositor = compositor(fetcher, config);

    let image = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 1.0))
        .await
        .unwrap()
        .into_image()
        .unwrap();

    // Slot (1, 0) starts at level-0 x=256 of 1024: r = 0.25, g = 0, b = 1/256
    assert_eq!(image.get_pixel(256, 0), &Rgb([64, 0, 1]));
    assert_eq!(image.get_pixel(511, 255), &Rgb([64, 0, 1]));
    assert_eq!(image.get_pixel(0, 0), &marker("1.2.3.1", 1));
    assert_eq!(image.get_pixel(512, 0), &marker("1.2.3.1", 3));
}

#[tokio::test]
async fn test_timeout_yields_hole() {
    let fetcher = MockFrameFetcher::new(TILE)
        .with_delay(Duration::from_millis(500))
        .into_arc();
    let config = ReaderConfig::default().with_read_timeout(Duration::from_millis(20));
    let compositor = compositor(fetcher, config);

    let read = compositor
        .read(&RegionRequest::new(0, 0, 512, 512, 1.0))
        .await
        .unwrap();

    let hole = read.hole().unwrap();
    assert_eq!(hole.cause, HoleCause::TimedOut);
    assert!(hole.missing_tiles().is_empty());
}

// =============================================================================
// Fetch Pool and Lifecycle
// =============================================================================

#[tokio::test]
async fn test_fetches_respect_pool_size() {
    let fetcher = MockFrameFetcher::new(TILE)
        .with_delay(Duration::from_millis(10))
        .into_arc();
    let config = ReaderConfig::default().with_concurrency(3);
    let compositor = compositor(fetcher.clone(), config);

    let read = compositor
        .read(&RegionRequest::new(0, 0, 1024, 768, 1.0))
        .await
        .unwrap();

    assert!(read.is_complete());
    assert_eq!(fetcher.call_count(), 12);
    assert!(fetcher.peak_in_flight() <= 3);
    assert!(fetcher.peak_in_flight() >= 1);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_compositor() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = Arc::new(compositor(fetcher.clone(), ReaderConfig::default()));

    let mut handles = Vec::new();
    for x in [0, 256, 512, 768] {
        let compositor = Arc::clone(&compositor);
        handles.push(tokio::spawn(async move {
            compositor
                .read(&RegionRequest::new(x, 0, 256, 256, 1.0))
                .await
        }));
    }

    for (index, handle) in handles.into_iter().enumerate() {
        let image = handle.await.unwrap().unwrap().into_image().unwrap();
        assert_eq!(image.get_pixel(0, 0), &marker("1.2.3.1", index as u32 + 1));
    }
}

#[tokio::test]
async fn test_closed_compositor_rejects_reads() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    compositor.close();

    let err = compositor
        .read(&RegionRequest::new(0, 0, 256, 256, 1.0))
        .await
        .unwrap_err();
    assert_eq!(err, RegionError::Closed);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_requests_issue_no_fetch() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let compositor = compositor(fetcher.clone(), ReaderConfig::default());

    let out_of_bounds = compositor
        .read(&RegionRequest::new(1000, 0, 100, 100, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(out_of_bounds, RegionError::InvalidRegion { .. }));

    let bad_downsample = compositor
        .read(&RegionRequest::new(0, 0, 100, 100, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(bad_downsample, RegionError::InvalidDownsample(_)));

    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_tile_cache_avoids_refetch() {
    let fetcher = MockFrameFetcher::new(TILE).into_arc();
    let config = ReaderConfig::default().with_tile_cache_capacity(16 * 1024 * 1024);
    let compositor = compositor(fetcher.clone(), config);

    let first = compositor
        .read(&RegionRequest::new(0, 0, 512, 512, 1.0))
        .await
        .unwrap();
    // Overlaps the first read in tiles (2, 1) and (2, 2)
    let second = compositor
        .read(&RegionRequest::new(256, 0, 512, 512, 1.0))
        .await
        .unwrap();

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert_eq!(fetcher.call_count(), 6);
    assert_eq!(compositor.cache().unwrap().len().await, 6);
}
