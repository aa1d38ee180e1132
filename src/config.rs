//! Configuration for region reads and the command-line tool.
//!
//! [`ReaderConfig`] tunes an open image (fetch concurrency, hole policy,
//! timeout, tile cache). [`Cli`] is the command-line surface of the
//! `wsi-dicom-reader` binary; every option can also be set through an
//! environment variable with the `WSI_` prefix:
//!
//! - `WSI_METADATA` - Series metadata document (DICOM JSON array)
//! - `WSI_FRAMES_DIR` - Local frame directory laid out as `<sop>/<frame>`
//! - `WSI_S3_BUCKET` - S3 bucket holding frames
//! - `WSI_S3_PREFIX` - Key prefix in front of `studies/...`
//! - `WSI_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `WSI_S3_REGION` - AWS region (default: us-east-1)
//! - `WSI_CONCURRENCY` - Concurrent frame fetches per image
//! - `WSI_TIMEOUT_MS` - Timeout for a whole region read
//! - `WSI_CACHE_TILES` - Decoded tile cache size in bytes (0 disables)
//! - `WSI_JPEG_QUALITY` - JPEG output quality (default: 80)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::region::{
    default_concurrency, is_valid_quality, HolePolicy, OutputFormat, DEFAULT_JPEG_QUALITY,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default downsample for `read`.
pub const DEFAULT_DOWNSAMPLE: f64 = 1.0;

// =============================================================================
// Reader Configuration
// =============================================================================

/// Settings for one open image.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Maximum concurrent frame fetches
    pub concurrency: usize,

    /// What a read does when tiles are missing
    pub hole_policy: HolePolicy,

    /// Limit on a whole read; `None` waits for every fetch
    pub read_timeout: Option<Duration>,

    /// Decoded tile cache size in bytes; 0 disables the cache
    pub tile_cache_capacity: usize,

    /// Draw a 1-pixel border around every tile slot
    pub debug_outlines: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            hole_policy: HolePolicy::FailWhole,
            read_timeout: None,
            tile_cache_capacity: 0,
            debug_outlines: false,
        }
    }
}

impl ReaderConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_hole_policy(mut self, policy: HolePolicy) -> Self {
        self.hole_policy = policy;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_tile_cache_capacity(mut self, bytes: usize) -> Self {
        self.tile_cache_capacity = bytes;
        self
    }

    pub fn with_debug_outlines(mut self, enabled: bool) -> Self {
        self.debug_outlines = enabled;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err("read timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI DICOM Reader - pyramid inspection and region reads for DICOM
/// whole-slide images.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-dicom-reader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the pyramid levels of a series
    Info(InfoConfig),

    /// Read a region and write it as JPEG or PNG
    Read(ReadConfig),
}

/// Arguments of the `info` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Series metadata document (DICOM JSON array of instances).
    #[arg(long, env = "WSI_METADATA")]
    pub metadata: PathBuf,

    /// Print the summary as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Where `read` gets frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    Directory(PathBuf),
    S3 {
        bucket: String,
        prefix: String,
        endpoint: Option<String>,
        region: String,
    },
}

/// Arguments of the `read` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ReadConfig {
    // =========================================================================
    // Input
    // =========================================================================
    /// Series metadata document (DICOM JSON array of instances).
    #[arg(long, env = "WSI_METADATA")]
    pub metadata: PathBuf,

    /// Directory holding frames as `<sop-instance-uid>/<frame-number>`.
    #[arg(long, env = "WSI_FRAMES_DIR", conflicts_with = "s3_bucket")]
    pub frames_dir: Option<PathBuf>,

    /// S3 bucket holding frames in DICOMweb layout.
    #[arg(long, env = "WSI_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix in front of `studies/<study>/series/<series>/...`.
    #[arg(long, default_value = "", env = "WSI_S3_PREFIX")]
    pub s3_prefix: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "WSI_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "WSI_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Region
    // =========================================================================
    /// Left edge of the region in level-0 pixels.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Top edge of the region in level-0 pixels.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Region width in level-0 pixels.
    #[arg(long)]
    pub width: u32,

    /// Region height in level-0 pixels.
    #[arg(long)]
    pub height: u32,

    /// Requested downsample; the closest pyramid level is read.
    #[arg(long, default_value_t = DEFAULT_DOWNSAMPLE)]
    pub downsample: f64,

    // =========================================================================
    // Output
    // =========================================================================
    /// Output file; the extension picks JPEG or PNG.
    #[arg(short, long)]
    pub output: PathBuf,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_JPEG_QUALITY")]
    pub quality: u8,

    // =========================================================================
    // Read Behaviour
    // =========================================================================
    /// Paint placeholder colours over missing tiles instead of failing.
    ///
    /// Diagnostic only: the output will not match the slide.
    #[arg(long, default_value_t = false)]
    pub placeholder_tiles: bool,

    /// Outline every tile in the output.
    #[arg(long, default_value_t = false)]
    pub debug_outlines: bool,

    /// Give up on the read after this many milliseconds.
    #[arg(long, env = "WSI_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Concurrent frame fetches (default: twice the CPU count, at least 16).
    #[arg(long, env = "WSI_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Decoded tile cache size in bytes (0 disables).
    #[arg(long, default_value_t = 0, env = "WSI_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.frames_dir, &self.s3_bucket) {
            (None, None) => {
                return Err(
                    "No frame source. Set --frames-dir (WSI_FRAMES_DIR) or --s3-bucket (WSI_S3_BUCKET)"
                        .to_string(),
                )
            }
            (Some(_), Some(_)) => {
                return Err("--frames-dir and --s3-bucket are mutually exclusive".to_string())
            }
            (None, Some(bucket)) if bucket.is_empty() => {
                return Err("S3 bucket name must not be empty".to_string())
            }
            _ => {}
        }

        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }

        if !self.downsample.is_finite() || self.downsample <= 0.0 {
            return Err("downsample must be a positive number".to_string());
        }

        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }

        OutputFormat::from_path(&self.output).map_err(|e| e.to_string())?;

        self.reader_config().validate()
    }

    /// Frame source selected by the arguments (call `validate()` first).
    pub fn frame_source(&self) -> FrameSource {
        match &self.frames_dir {
            Some(dir) => FrameSource::Directory(dir.clone()),
            None => FrameSource::S3 {
                bucket: self.s3_bucket.clone().unwrap_or_default(),
                prefix: self.s3_prefix.clone(),
                endpoint: self.s3_endpoint.clone(),
                region: self.s3_region.clone(),
            },
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        let mut config = ReaderConfig::default()
            .with_tile_cache_capacity(self.cache_tiles)
            .with_debug_outlines(self.debug_outlines);

        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(timeout) = self.timeout_ms {
            config = config.with_read_timeout(Duration::from_millis(timeout));
        }
        if self.placeholder_tiles {
            config = config.with_hole_policy(HolePolicy::Placeholder);
        }

        config
    }
}

// =============================================================================
// Tests
// =============================================================================
