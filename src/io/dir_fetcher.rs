use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbImage;

use super::fetcher::{decode_frame, FrameFetcher};
use crate::error::FetchError;

/// Frame store on the local filesystem, laid out as `<root>/<sop>/<n>`.
///
/// Useful for exported series and for tests.
#[derive(Debug, Clone)]
pub struct DirectoryFrameFetcher {
    root: PathBuf,
    identifier: String,
}

impl DirectoryFrameFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Path of one frame file.
    pub fn frame_path(&self, instance_uid: &str, frame_index: u32) -> PathBuf {
        self.root.join(instance_uid).join(frame_index.to_string())
    }
}

#[async_trait]
impl FrameFetcher for DirectoryFrameFetcher {
    async fn fetch(&self, instance_uid: &str, frame_index: u32) -> Result<RgbImage, FetchError> {
        let path = self.frame_path(instance_uid, frame_index);
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotFound {
                instance: instance_uid.to_string(),
                frame: frame_index,
            },
            _ => FetchError::Network(format!("{}: {}", path.display(), e)),
        })?;

        decode_frame(&bytes)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
