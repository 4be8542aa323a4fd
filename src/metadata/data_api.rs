use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::timeout;

use super::{MediaKind, MetadataResolver, NO_VIDEO_ID_MESSAGE, VideoMetadata, extract_video_id};
use crate::{
    duration::{display_duration, parse_iso8601_duration},
    error::ApiError,
    retry::RetryPolicy,
};

const THUMBNAIL_PREFERENCE: [&str; 5] = ["maxres", "standard", "high", "medium", "default"];

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    #[serde(rename = "liveBroadcastContent")]
    live_broadcast_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl VideoItem {
    fn into_metadata(self) -> VideoMetadata {
        let is_live = self.snippet.live_broadcast_content.as_deref() == Some("live");
        let seconds = self
            .content_details
            .and_then(|details| details.duration)
            .and_then(|value| parse_iso8601_duration(&value));
        let thumbnail = THUMBNAIL_PREFERENCE
            .iter()
            .find_map(|size| self.snippet.thumbnails.get(*size))
            .map(|thumbnail| thumbnail.url.clone());

        VideoMetadata {
            kind: MediaKind::Video,
            id: self.id,
            title: self.snippet.title,
            thumbnail,
            duration: display_duration(seconds, is_live),
        }
    }
}

/// Resolves metadata through the official Data API with a server-held key.
/// The video id is parsed locally from the URL.
pub struct DataApiResolver {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl DataApiResolver {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url,
            timeout,
            retry,
        }
    }

    async fn fetch(&self, api_key: &str, video_id: &str) -> Result<VideoListResponse, ApiError> {
        let request = self
            .http
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", video_id),
                ("key", api_key),
            ]);
        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::timeout("Data API did not answer in time"))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::unknown(format!("Data API answered {status}: {body}"));
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                error.transient()
            } else {
                error
            });
        }

        response
            .json::<VideoListResponse>()
            .await
            .map_err(|error| ApiError::unknown(format!("unreadable Data API payload: {error}")))
    }
}

#[async_trait]
impl MetadataResolver for DataApiResolver {
    fn name(&self) -> &'static str {
        "data-api"
    }

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::configuration("YOUTUBE_API_KEY"))?;
        let video_id = extract_video_id(url)
            .ok_or_else(|| ApiError::validation(NO_VIDEO_ID_MESSAGE))?;

        let response = self
            .retry
            .run("Data API lookup", || self.fetch(api_key, &video_id))
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(VideoItem::into_metadata)
            .ok_or_else(ApiError::not_found)
    }
}
