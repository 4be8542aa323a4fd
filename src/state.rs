use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    auth::AuthContext,
    config::{Config, DeliveryMode},
    metadata::{MetadataResolver, build_metadata_resolver},
    source::{StreamSource, YtDlp, build_stream_source},
    transcode::{FfmpegTranscoder, Transcoder},
};

const HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Everything a handler needs. Built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub delivery_mode: DeliveryMode,
    pub source: Arc<dyn StreamSource>,
    pub transcoder: Arc<dyn Transcoder>,
    pub metadata: Arc<dyn MetadataResolver>,
    /// How long to wait for the first encoded bytes before giving up with a
    /// JSON error instead of an empty download.
    pub first_chunk_timeout: Duration,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let auth = Arc::new(AuthContext::from_cookie(config.youtube_cookie.as_deref()));
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECONDS))
            .build()
            .map_err(|error| format!("could not build HTTP client: {error}"))?;
        let ytdlp = YtDlp::new(&config.yt_dlp_bin, auth, config.acquire_timeout);

        let source = build_stream_source(config, ytdlp.clone(), http.clone());
        let metadata = build_metadata_resolver(config, ytdlp, http);
        let transcoder = Arc::new(FfmpegTranscoder::new(
            &config.ffmpeg_bin,
            config.transcode_timeout,
        ));

        info!(
            "Delivery mode {:?}, stream source {}, metadata strategy {}.",
            config.delivery_mode,
            source.name(),
            metadata.name()
        );

        Ok(Self {
            delivery_mode: config.delivery_mode,
            source,
            transcoder,
            metadata,
            first_chunk_timeout: config.acquire_timeout,
        })
    }
}
