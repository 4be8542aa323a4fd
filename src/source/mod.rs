//! Upstream audio acquisition.
//!
//! Everything that talks to the video platform to obtain audio sits behind
//! [`StreamSource`], so the delivery pipeline never knows which extraction
//! strategy is active.

mod pipe;
mod resolved;
pub mod ytdlp;

use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

pub use pipe::PipeSource;
pub use resolved::ResolvedUrlSource;
pub use ytdlp::YtDlp;

use crate::{
    config::{Config, StreamSourceKind},
    error::ApiError,
    request::VideoId,
    retry::RetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Stream,
    DirectUrl,
}

pub enum AcquiredAudio {
    Stream(AudioStream),
    DirectUrl(String),
}

impl std::fmt::Debug for AcquiredAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::DirectUrl(url) => f.debug_tuple("DirectUrl").field(url).finish(),
        }
    }
}

#[async_trait]
pub trait StreamSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(
        &self,
        video_id: &VideoId,
        acquisition: Acquisition,
    ) -> Result<AcquiredAudio, ApiError>;
}

/// An in-flight upstream audio track. Owned by exactly one request; dropping
/// it closes the connection and kills any process feeding it.
pub struct AudioStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl AudioStream {
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            reader: Box::pin(reader),
        }
    }
}

impl AsyncRead for AudioStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().reader.as_mut().poll_read(cx, buf)
    }
}

pub fn build_stream_source(
    config: &Config,
    ytdlp: YtDlp,
    http: reqwest::Client,
) -> Arc<dyn StreamSource> {
    let retry = RetryPolicy::new(config.upstream_max_attempts);
    match config.stream_source {
        StreamSourceKind::ResolvedUrl => Arc::new(ResolvedUrlSource::new(ytdlp, http, retry)),
        StreamSourceKind::Pipe => Arc::new(PipeSource::new(ytdlp, retry)),
    }
}
