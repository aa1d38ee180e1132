use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;
use image::RgbImage;
use tracing::debug;

use super::fetcher::{decode_frame, FrameFetcher};
use crate::error::FetchError;

/// Frame store backed by S3 or an S3-compatible service (MinIO, GCS, etc.).
///
/// Frames are stored one object per frame, following the DICOMweb URL layout:
///
/// ```text
/// <prefix>/studies/<study>/series/<series>/instances/<sop>/frames/<n>
/// ```
///
/// A missing object maps to [`FetchError::NotFound`]; the store may simply
/// not have converged yet.
#[derive(Clone)]
pub struct S3FrameFetcher {
    client: Client,
    bucket: String,
    series_prefix: String,
    identifier: String,
}

impl S3FrameFetcher {
    /// Create a fetcher for one series.
    ///
    /// `prefix` may be empty; surrounding slashes are ignored.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        prefix: &str,
        study_uid: &str,
        series_uid: &str,
    ) -> Self {
        let bucket = bucket.into();
        let prefix = prefix.trim_matches('/');
        let series_prefix = if prefix.is_empty() {
            format!("studies/{}/series/{}", study_uid, series_uid)
        } else {
            format!("{}/studies/{}/series/{}", prefix, study_uid, series_uid)
        };
        let identifier = format!("s3://{}/{}", bucket, series_prefix);

        Self {
            client,
            bucket,
            series_prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key of one frame.
    pub fn frame_key(&self, instance_uid: &str, frame_index: u32) -> String {
        format!(
            "{}/instances/{}/frames/{}",
            self.series_prefix, instance_uid, frame_index
        )
    }

    async fn get_frame_bytes(
        &self,
        instance_uid: &str,
        frame_index: u32,
    ) -> Result<Bytes, FetchError> {
        let key = self.frame_key(instance_uid, frame_index);
        let not_found = || FetchError::NotFound {
            instance: instance_uid.to_string(),
            frame: frame_index,
        };

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let is_no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                if is_no_such_key {
                    return not_found();
                }

                // Some S3-compatible services answer with a bare 404
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if status_is_404 {
                    return not_found();
                }

                let err_str = e.to_string();
                if err_str.contains("NoSuchKey") || err_str.contains("NotFound") {
                    return not_found();
                }

                FetchError::Network(format!("s3://{}/{}: {}", self.bucket, key, err_str))
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .into_bytes();

        debug!(key = %key, bytes = data.len(), "Fetched frame");
        Ok(data)
    }
}

#[async_trait]
impl FrameFetcher for S3FrameFetcher {
    async fn fetch(&self, instance_uid: &str, frame_index: u32) -> Result<RgbImage, FetchError> {
        let bytes = self.get_frame_bytes(instance_uid, frame_index).await?;
        decode_frame(&bytes)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // Custom endpoints rarely support virtual-hosted buckets
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();

    Client::from_conf(s3_config)
}
