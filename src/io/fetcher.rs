use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageReader, RgbImage};

use crate::error::FetchError;

/// Source of decoded tile rasters.
///
/// The region compositor calls this once per needed tile, concurrently, so
/// implementations must be cheap to share across tasks. A frame the store
/// does not have yet should fail with [`FetchError::NotFound`] rather than a
/// generic network error, since the store may still be converging.
///
/// # Example
///
/// ```ignore
/// let tile = fetcher.fetch("1.2.840.1234", 1).await?;
/// assert_eq!(tile.dimensions(), (256, 256));
/// ```
#[async_trait]
pub trait FrameFetcher: Send + Sync {
    /// Fetch and decode frame `frame_index` (1-based) of an instance.
    async fn fetch(&self, instance_uid: &str, frame_index: u32) -> Result<RgbImage, FetchError>;

    /// Identifier of the backing store, used in logs.
    fn identifier(&self) -> &str;
}

/// Decode encoded frame bytes (JPEG or PNG) into an RGB raster.
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage, FetchError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::Decode {
            message: e.to_string(),
        })?;

    if reader.format().is_none() {
        return Err(FetchError::Decode {
            message: "unrecognized frame encoding".to_string(),
        });
    }

    let image = reader.decode().map_err(|e| FetchError::Decode {
        message: e.to_string(),
    })?;

    Ok(image.to_rgb8())
}
