use std::io;

use async_stream::try_stream;
use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStdout},
    time::timeout,
};
use tokio_util::io::{ReaderStream, StreamReader};

use super::{AcquiredAudio, Acquisition, AudioStream, StreamSource, YtDlp, ytdlp::classify_failure};
use crate::{
    error::ApiError,
    process::{TaskGuard, collect_stderr_tail},
    request::VideoId,
    retry::RetryPolicy,
};

const FIRST_READ_BYTES: usize = 64 * 1024;

/// Acquisition only succeeds once the first bytes have arrived.
pub struct PipeSource {
    ytdlp: YtDlp,
    retry: RetryPolicy,
}

impl PipeSource {
    pub fn new(ytdlp: YtDlp, retry: RetryPolicy) -> Self {
        Self { ytdlp, retry }
    }

    async fn open(&self, video_id: &VideoId) -> Result<AudioStream, ApiError> {
        let mut child = self.ytdlp.spawn_audio_pipe(video_id)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ApiError::unknown("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ApiError::unknown("yt-dlp stderr was not captured"))?;
        let stderr_tail = TaskGuard::spawn(collect_stderr_tail(stderr, "yt-dlp"));

        let mut first = vec![0; FIRST_READ_BYTES];
        let read = timeout(self.ytdlp.timeout(), stdout.read(&mut first))
            .await
            .map_err(|_| ApiError::timeout("yt-dlp produced no audio in time"))?
            .map_err(|error| ApiError::unknown(format!("reading yt-dlp output failed: {error}")))?;

        if read == 0 {
            let status = child
                .wait()
                .await
                .map_err(|error| ApiError::unknown(format!("waiting for yt-dlp failed: {error}")))?;
            let tail = stderr_tail.join().await.unwrap_or_default();
            return Err(if status.success() {
                ApiError::upstream_unavailable("the platform returned an empty audio track.")
            } else {
                classify_failure(tail.as_bytes())
            });
        }

        first.truncate(read);
        let body = piped_audio(Bytes::from(first), stdout, child, stderr_tail);
        Ok(AudioStream::new(StreamReader::new(Box::pin(body))))
    }
}

/// Replays the probed first chunk, then the rest of stdout. A non-zero exit
/// after EOF surfaces as a read error so a truncated upstream is not mistaken
/// for a complete track.
fn piped_audio(
    first: Bytes,
    stdout: ChildStdout,
    mut child: Child,
    stderr_tail: TaskGuard<String>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    try_stream! {
        yield first;

        let mut chunks = ReaderStream::new(stdout);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            yield chunk;
        }

        let status = child.wait().await?;
        if !status.success() {
            let tail = stderr_tail.join().await.unwrap_or_default();
            Err::<(), io::Error>(io::Error::other(format!("yt-dlp exited with {status}: {tail}")))?;
        }
    }
}

#[async_trait]
impl StreamSource for PipeSource {
    fn name(&self) -> &'static str {
        "pipe"
    }

    async fn acquire(
        &self,
        video_id: &VideoId,
        acquisition: Acquisition,
    ) -> Result<AcquiredAudio, ApiError> {
        match acquisition {
            Acquisition::DirectUrl => self
                .retry
                .run("audio URL resolution", || self.ytdlp.resolve_audio_url(video_id))
                .await
                .map(AcquiredAudio::DirectUrl),
            Acquisition::Stream => self
                .retry
                .run("audio pipe", || self.open(video_id))
                .await
                .map(AcquiredAudio::Stream),
        }
    }
}
