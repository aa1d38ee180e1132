mod dir_fetcher;
mod fetcher;
mod s3_fetcher;

pub use dir_fetcher::DirectoryFrameFetcher;
pub use fetcher::{decode_frame, FrameFetcher};
pub use s3_fetcher::{create_s3_client, S3FrameFetcher};
