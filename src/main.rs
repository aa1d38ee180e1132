//! WSI DICOM Reader - inspect DICOM whole-slide pyramids and read regions.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_dicom_reader::{
    config::{Cli, Command, FrameSource, InfoConfig, ReadConfig},
    create_s3_client, encode_region, load_series_metadata, DicomSlide, DirectoryFrameFetcher,
    FrameFetcher, InstanceMetadata, OutputFormat, PyramidIndex, PyramidSummary, RegionRead,
    RegionRequest, S3FrameFetcher,
};

/// Exit code when the region is not available yet (EX_TEMPFAIL).
const EXIT_HOLE: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config).await,
        Command::Read(config) => run_read(config).await,
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.verbose);

    let Some(instances) = load_instances(&config.metadata).await else {
        return ExitCode::FAILURE;
    };

    let pyramid = match PyramidIndex::open(&instances) {
        Ok(pyramid) => pyramid,
        Err(e) => {
            error!("Failed to build pyramid: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let summary = pyramid.summary();
    if config.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&summary);
    }

    ExitCode::SUCCESS
}

fn print_summary(summary: &PyramidSummary) {
    println!("Study:  {}", summary.study_uid);
    println!("Series: {}", summary.series_uid);
    println!("Size:   {} x {}", summary.width, summary.height);
    println!();
    println!(
        "{:>5}  {:>12}  {:>11}  {:>9}  {:>10}  {:>10}  MODE",
        "LEVEL", "SIZE", "TILE", "GRID", "ASSIGNED", "DOWNSAMPLE"
    );

    for (index, level) in summary.levels.iter().enumerate() {
        let total = level.tiles_x as usize * level.tiles_y as usize;
        println!(
            "{:>5}  {:>12}  {:>11}  {:>9}  {:>10}  {:>10.3}  {}",
            index,
            format!("{}x{}", level.width, level.height),
            format!("{}x{}", level.tile_width, level.tile_height),
            format!("{}x{}", level.tiles_x, level.tiles_y),
            format!("{}/{}", level.assigned_tiles, total),
            level.downsample,
            level.tiling_mode,
        );
    }
}

// =============================================================================
// Read Command
// =============================================================================

async fn run_read(config: ReadConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let Some(instances) = load_instances(&config.metadata).await else {
        return ExitCode::FAILURE;
    };

    let pyramid = match PyramidIndex::open(&instances) {
        Ok(pyramid) => Arc::new(pyramid),
        Err(e) => {
            error!("Failed to build pyramid: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher: Arc<dyn FrameFetcher> = match config.frame_source() {
        FrameSource::Directory(dir) => Arc::new(DirectoryFrameFetcher::new(dir)),
        FrameSource::S3 {
            bucket,
            prefix,
            endpoint,
            region,
        } => {
            let client = create_s3_client(endpoint.as_deref(), &region).await;
            Arc::new(S3FrameFetcher::new(
                client,
                bucket,
                &prefix,
                pyramid.study_uid(),
                pyramid.series_uid(),
            ))
        }
    };
    info!("Frame source: {}", fetcher.identifier());

    let slide = match DicomSlide::from_pyramid(pyramid, fetcher, config.reader_config()) {
        Ok(slide) => slide,
        Err(e) => {
            error!("Failed to open slide: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = RegionRequest::new(
        config.x,
        config.y,
        config.width,
        config.height,
        config.downsample,
    );
    let read = slide.read_region(&request).await;
    slide.close();

    let image = match read {
        Ok(RegionRead::Complete(image)) => image,
        Ok(RegionRead::Hole(hole)) => {
            warn!("Region not available yet: {}", hole);
            for tile in hole.missing_tiles() {
                warn!("  tile ({}, {}): {:?}", tile.tile_x, tile.tile_y, tile.reason);
            }
            return ExitCode::from(EXIT_HOLE);
        }
        Err(e) => {
            error!("Region read failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let encoded = OutputFormat::from_path(&config.output)
        .and_then(|format| encode_region(&image, format, config.quality));
    let encoded = match encoded {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::write(&config.output, &encoded).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} region to {} ({} bytes)",
        image.width(),
        image.height(),
        config.output.display(),
        encoded.len()
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Shared Helpers
// =============================================================================

async fn load_instances(path: &std::path::Path) -> Option<Vec<InstanceMetadata>> {
    match load_series_metadata(path).await {
        Ok(instances) => {
            info!("Loaded {} instance(s) from {}", instances.len(), path.display());
            Some(instances)
        }
        Err(e) => {
            error!("Failed to load metadata {}: {}", path.display(), e);
            None
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_dicom_reader=debug"
    } else {
        "wsi_dicom_reader=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
