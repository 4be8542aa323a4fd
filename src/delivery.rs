//! The audio delivery pipeline: acquire, transcode, respond.

use std::io;

use axum::{
    body::{Body, Bytes},
    http::{
        HeaderMap, HeaderValue,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{error, info};

use crate::{
    error::ApiError,
    request::{DownloadRequest, VideoId},
    source::{AcquiredAudio, Acquisition},
    state::AppState,
    transcode::EncodedStream,
};

/// Streams the video's audio as MP3.
///
/// Headers are only committed once the encoder has produced its first chunk.
/// Anything that fails before that point is still reported as a JSON error;
/// anything after it can only cut the body short.
pub async fn stream_mp3(state: &AppState, request: DownloadRequest) -> Result<Response, ApiError> {
    let audio = match state
        .source
        .acquire(&request.video_id, Acquisition::Stream)
        .await?
    {
        AcquiredAudio::Stream(audio) => audio,
        AcquiredAudio::DirectUrl(_) => {
            return Err(ApiError::unknown(format!(
                "{} returned a URL for a stream acquisition",
                state.source.name()
            )));
        }
    };

    let mut encoded = state.transcoder.transcode(audio)?;
    let first = match timeout(state.first_chunk_timeout, encoded.next()).await {
        Ok(Some(Ok(chunk))) => chunk,
        Ok(Some(Err(error))) => return Err(ApiError::encoding(error.to_string())),
        Ok(None) => return Err(ApiError::encoding("encoder produced no output")),
        Err(_) => {
            return Err(ApiError::timeout(format!(
                "encoder produced no output within {:?}",
                state.first_chunk_timeout
            )));
        }
    };

    let filename = request.filename();
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_bytes(filename.content_disposition().as_bytes())
            .map_err(|_| ApiError::unknown("could not build the Content-Disposition header"))?,
    );

    info!(filename = filename.as_str(), "Streaming MP3");
    let body = Body::from_stream(committed_body(first, encoded, request.video_id));
    Ok((headers, body).into_response())
}

/// Resolves a direct upstream URL for the audio-only track.
pub async fn direct_url(state: &AppState, video_id: &VideoId) -> Result<String, ApiError> {
    match state.source.acquire(video_id, Acquisition::DirectUrl).await? {
        AcquiredAudio::DirectUrl(url) => Ok(url),
        AcquiredAudio::Stream(_) => Err(ApiError::unknown(format!(
            "{} returned a stream for a URL acquisition",
            state.source.name()
        ))),
    }
}

/// Body after headers are out. Errors are logged and passed on so the
/// connection is reset instead of finishing as if the file were complete.
fn committed_body(
    first: Bytes,
    mut rest: EncodedStream,
    video_id: VideoId,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    async_stream::stream! {
        let mut sent = first.len();
        yield Ok(first);

        while let Some(item) = rest.next().await {
            match item {
                Ok(chunk) => {
                    sent += chunk.len();
                    yield Ok(chunk);
                }
                Err(failure) => {
                    error!(
                        video_id = %video_id,
                        bytes_sent = sent,
                        "MP3 delivery aborted after headers were sent: {failure}"
                    );
                    yield Err(failure);
                    return;
                }
            }
        }

        info!(video_id = %video_id, bytes_sent = sent, "MP3 delivery finished");
    }
}
