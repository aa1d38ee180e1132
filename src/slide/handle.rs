use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::ReaderConfig;
use crate::dicom::{load_series_metadata, InstanceMetadata};
use crate::error::{RegionError, SlideError};
use crate::io::FrameFetcher;
use crate::pyramid::{LevelInfo, PyramidIndex};
use crate::region::{RegionCompositor, RegionRead, RegionRequest};

/// An open whole-slide image.
///
/// Holds the pyramid index, built once at open time, and the compositor that
/// serves region reads with its own fetch pool. The pool is released by
/// [`close`](Self::close) or when the slide is dropped.
pub struct DicomSlide<F: ?Sized> {
    compositor: RegionCompositor<F>,
}

impl<F> DicomSlide<F>
where
    F: FrameFetcher + ?Sized + 'static,
{
    /// Open a slide from already decoded instance metadata.
    pub fn open(
        instances: &[InstanceMetadata],
        fetcher: Arc<F>,
        config: ReaderConfig,
    ) -> Result<Self, SlideError> {
        let pyramid = Arc::new(PyramidIndex::open(instances)?);
        Self::from_pyramid(pyramid, fetcher, config)
    }

    /// Open a slide over a pyramid that has already been built.
    pub fn from_pyramid(
        pyramid: Arc<PyramidIndex>,
        fetcher: Arc<F>,
        config: ReaderConfig,
    ) -> Result<Self, SlideError> {
        config.validate().map_err(SlideError::Config)?;

        info!(
            study_uid = pyramid.study_uid(),
            series_uid = pyramid.series_uid(),
            width = pyramid.width(),
            height = pyramid.height(),
            levels = pyramid.level_count(),
            source = fetcher.identifier(),
            "Opened slide"
        );

        Ok(Self {
            compositor: RegionCompositor::new(pyramid, fetcher, config),
        })
    }

    /// Open a slide from a series metadata document on disk.
    pub async fn open_file(
        metadata: impl AsRef<Path>,
        fetcher: Arc<F>,
        config: ReaderConfig,
    ) -> Result<Self, SlideError> {
        let instances = load_series_metadata(metadata).await?;
        Self::open(&instances, fetcher, config)
    }

    /// Read a region; see [`RegionCompositor::read`].
    pub async fn read_region(&self, request: &RegionRequest) -> Result<RegionRead, RegionError> {
        self.compositor.read(request).await
    }

    pub fn pyramid(&self) -> &PyramidIndex {
        self.compositor.pyramid()
    }

    /// Level-0 size as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        let pyramid = self.pyramid();
        (pyramid.width(), pyramid.height())
    }

    pub fn level_count(&self) -> usize {
        self.pyramid().level_count()
    }

    pub fn level_info(&self, level: usize) -> Option<LevelInfo> {
        self.pyramid().level_info(level)
    }

    pub fn downsamples(&self) -> &[f64] {
        self.pyramid().downsamples()
    }

    pub fn config(&self) -> &ReaderConfig {
        self.compositor.config()
    }

    /// Release the fetch pool. Later reads fail with [`RegionError::Closed`].
    pub fn close(&self) {
        self.compositor.close();
    }

    pub fn is_closed(&self) -> bool {
        self.compositor.is_closed()
    }
}
