use std::io;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use tokio::time::timeout;
use tokio_util::io::StreamReader;
use tracing::info;

use super::{AcquiredAudio, Acquisition, AudioStream, StreamSource, YtDlp};
use crate::{error::ApiError, request::VideoId, retry::RetryPolicy};

pub struct ResolvedUrlSource {
    ytdlp: YtDlp,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl ResolvedUrlSource {
    pub fn new(ytdlp: YtDlp, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { ytdlp, http, retry }
    }

    async fn open(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let response = timeout(self.ytdlp.timeout(), self.http.get(url).send())
            .await
            .map_err(|_| ApiError::timeout("audio stream did not answer in time"))??;

        check_media_status(response.status())?;
        Ok(response)
    }
}

fn check_media_status(status: StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }

    let detail = format!("media host answered {status}");
    match status {
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => Err(
            ApiError::upstream_unavailable("the platform refused to serve this audio track.")
                .with_detail(detail),
        ),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::unknown(detail).transient()),
        _ if status.is_server_error() => Err(ApiError::unknown(detail).transient()),
        _ => Err(ApiError::unknown(detail)),
    }
}

#[async_trait]
impl StreamSource for ResolvedUrlSource {
    fn name(&self) -> &'static str {
        "resolved-url"
    }

    async fn acquire(
        &self,
        video_id: &VideoId,
        acquisition: Acquisition,
    ) -> Result<AcquiredAudio, ApiError> {
        let url = self
            .retry
            .run("audio URL resolution", || self.ytdlp.resolve_audio_url(video_id))
            .await?;

        if acquisition == Acquisition::DirectUrl {
            return Ok(AcquiredAudio::DirectUrl(url));
        }

        let response = self.retry.run("audio fetch", || self.open(&url)).await?;
        info!(
            video_id = %video_id,
            content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
            content_length = ?response.content_length(),
            "Upstream audio stream opened"
        );

        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(AcquiredAudio::Stream(AudioStream::new(StreamReader::new(body))))
    }
}
