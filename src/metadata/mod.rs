//! Video metadata lookup, either through the extractor or the official Data API.

mod data_api;
mod extractor;
mod video_id;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

pub use data_api::DataApiResolver;
pub use extractor::ExtractorResolver;
pub use video_id::extract_video_id;

use crate::{
    config::{Config, MetadataStrategy},
    error::ApiError,
    retry::RetryPolicy,
    source::YtDlp,
};

pub(crate) const NO_VIDEO_ID_MESSAGE: &str = "Could not find a video ID in the URL.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    /// `HH:MM:SS`, `Live` or `N/A`.
    pub duration: String,
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, ApiError>;
}

pub fn build_metadata_resolver(
    config: &Config,
    ytdlp: YtDlp,
    http: reqwest::Client,
) -> Arc<dyn MetadataResolver> {
    let retry = RetryPolicy::new(config.upstream_max_attempts);
    match config.metadata_strategy {
        MetadataStrategy::Extractor => Arc::new(ExtractorResolver::new(ytdlp, retry)),
        MetadataStrategy::DataApi => {
            if config.youtube_api_key.is_none() {
                warn!("METADATA_STRATEGY=data-api without YOUTUBE_API_KEY. Metadata requests will fail.");
            }
            Arc::new(DataApiResolver::new(
                http,
                config.youtube_api_key.clone(),
                config.data_api_base_url.clone(),
                config.acquire_timeout,
                retry,
            ))
        }
    }
}
