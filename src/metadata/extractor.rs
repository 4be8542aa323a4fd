use async_trait::async_trait;
use serde::Deserialize;

use super::{MediaKind, MetadataResolver, NO_VIDEO_ID_MESSAGE, VideoMetadata, extract_video_id};
use crate::{
    duration::display_duration, error::ApiError, request::VideoId, retry::RetryPolicy,
    source::YtDlp,
};

#[derive(Debug, Deserialize)]
struct YtDlpVideoInfo {
    id: String,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    is_live: Option<bool>,
    live_status: Option<String>,
}

impl YtDlpVideoInfo {
    fn is_live(&self) -> bool {
        self.is_live.unwrap_or(false) || self.live_status.as_deref() == Some("is_live")
    }

    fn into_metadata(self) -> VideoMetadata {
        let seconds = self
            .duration
            .filter(|value| value.is_finite() && *value >= 0.0)
            .map(|value| value as u64);
        let duration = display_duration(seconds, self.is_live());

        VideoMetadata {
            kind: MediaKind::Video,
            id: self.id,
            title: self.title.unwrap_or_default(),
            thumbnail: self.thumbnail,
            duration,
        }
    }
}

/// Resolves metadata with `yt-dlp -J`.
pub struct ExtractorResolver {
    ytdlp: YtDlp,
    retry: RetryPolicy,
}

impl ExtractorResolver {
    pub fn new(ytdlp: YtDlp, retry: RetryPolicy) -> Self {
        Self { ytdlp, retry }
    }
}

#[async_trait]
impl MetadataResolver for ExtractorResolver {
    fn name(&self) -> &'static str {
        "extractor"
    }

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, ApiError> {
        // Only a recognised video id ever reaches the extractor, never the raw URL.
        let video_id = extract_video_id(url)
            .ok_or_else(|| ApiError::validation(NO_VIDEO_ID_MESSAGE))
            .and_then(|id| VideoId::parse(Some(id.as_str())))?;
        let watch_url = video_id.watch_url();

        let stdout = self
            .retry
            .run("metadata extraction", || self.ytdlp.dump_info(&watch_url))
            .await?;
        let info: YtDlpVideoInfo = serde_json::from_slice(&stdout)
            .map_err(|error| ApiError::unknown(format!("unreadable yt-dlp JSON: {error}")))?;

        Ok(info.into_metadata())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{auth::AuthContext, error::ErrorKind};

    fn resolver_without_binary() -> ExtractorResolver {
        ExtractorResolver::new(
            YtDlp::new(
                "/nonexistent/yt-dlp",
                Arc::new(AuthContext::anonymous()),
                Duration::from_secs(5),
            ),
            RetryPolicy::no_retry(),
        )
    }

    #[tokio::test]
    async fn foreign_hosts_never_reach_the_extractor() {
        let resolver = resolver_without_binary();
        for url in [
            "http://169.254.169.254/latest/meta-data/",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "file:///etc/passwd",
        ] {
            let error = resolver.resolve(url).await.unwrap_err();
            assert_eq!(error.kind, ErrorKind::Validation, "{url}");
            assert_eq!(error.message, NO_VIDEO_ID_MESSAGE);
        }
    }

    #[tokio::test]
    async fn bare_ids_and_short_links_are_accepted() {
        let resolver = resolver_without_binary();
        for url in ["dQw4w9WgXcQ", "https://youtu.be/dQw4w9WgXcQ"] {
            // Passes validation and fails on the missing binary instead.
            let error = resolver.resolve(url).await.unwrap_err();
            assert_eq!(error.kind, ErrorKind::Unknown, "{url}");
            assert!(error.detail.unwrap().contains("not installed"));
        }
    }

    fn parse(json: &str) -> VideoMetadata {
        serde_json::from_str::<YtDlpVideoInfo>(json)
            .unwrap()
            .into_metadata()
    }

    #[test]
    fn maps_a_regular_video() {
        let metadata = parse(
            r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg","duration":212.0,"is_live":false,"formats":[]}"#,
        );
        assert_eq!(metadata.id, "dQw4w9WgXcQ");
        assert_eq!(metadata.duration, "00:03:32");
        assert_eq!(
            metadata.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
    }

    #[test]
    fn live_streams_report_live() {
        let metadata = parse(r#"{"id":"x","title":"Radio","duration":5400,"live_status":"is_live"}"#);
        assert_eq!(metadata.duration, "Live");

        let flagged = parse(r#"{"id":"x","title":"Radio","is_live":true}"#);
        assert_eq!(flagged.duration, "Live");
    }

    #[test]
    fn missing_duration_is_not_available() {
        let metadata = parse(r#"{"id":"x","title":null,"duration":null}"#);
        assert_eq!(metadata.duration, "N/A");
        assert_eq!(metadata.title, "");
    }
}
