use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_DATA_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_TRANSCODE_TIMEOUT_SECONDS: u64 = 600;
const DEFAULT_UPSTREAM_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStrategy {
    Extractor,
    DataApi,
}

impl FromStr for MetadataStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extractor" | "yt-dlp" => Ok(Self::Extractor),
            "data-api" | "api" => Ok(Self::DataApi),
            other => Err(format!(
                "invalid METADATA_STRATEGY {other:?} (expected extractor|data-api)"
            )),
        }
    }
}

/// How `/api/download-mp3` answers: transcoded bytes, or a JSON body with a
/// direct upstream URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Stream,
    Proxy,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "proxy" => Ok(Self::Proxy),
            other => Err(format!(
                "invalid DELIVERY_MODE {other:?} (expected stream|proxy)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSourceKind {
    ResolvedUrl,
    Pipe,
}

impl FromStr for StreamSourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resolved-url" | "url" => Ok(Self::ResolvedUrl),
            "pipe" => Ok(Self::Pipe),
            other => Err(format!(
                "invalid STREAM_SOURCE {other:?} (expected resolved-url|pipe)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub youtube_cookie: Option<String>,
    pub youtube_api_key: Option<String>,
    pub metadata_strategy: MetadataStrategy,
    pub delivery_mode: DeliveryMode,
    pub stream_source: StreamSourceKind,
    pub yt_dlp_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub acquire_timeout: Duration,
    pub transcode_timeout: Duration,
    pub upstream_max_attempts: usize,
    pub data_api_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let read = |name: &str| {
            lookup(name).and_then(|value| non_empty(&value).map(ToString::to_string))
        };

        let youtube_api_key = read("YOUTUBE_API_KEY");
        let metadata_strategy = match read("METADATA_STRATEGY") {
            Some(value) => value.parse()?,
            None if youtube_api_key.is_some() => MetadataStrategy::DataApi,
            None => MetadataStrategy::Extractor,
        };
        let delivery_mode = read("DELIVERY_MODE")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(DeliveryMode::Stream);
        let stream_source = read("STREAM_SOURCE")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(StreamSourceKind::ResolvedUrl);

        let read_u64 = |name: &str, default: u64| {
            read_parsed::<u64>(read(name), name)
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };

        Ok(Self {
            bind_addr: resolve_bind_addr(read("APP_ADDR"), read("PORT")),
            youtube_cookie: lookup("YOUTUBE_COOKIE"),
            youtube_api_key,
            metadata_strategy,
            delivery_mode,
            stream_source,
            yt_dlp_bin: PathBuf::from(read("YT_DLP_BIN").unwrap_or_else(|| "yt-dlp".to_string())),
            ffmpeg_bin: PathBuf::from(read("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string())),
            acquire_timeout: Duration::from_secs(read_u64(
                "ACQUIRE_TIMEOUT_SECONDS",
                DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
            )),
            transcode_timeout: Duration::from_secs(read_u64(
                "TRANSCODE_TIMEOUT_SECONDS",
                DEFAULT_TRANSCODE_TIMEOUT_SECONDS,
            )),
            upstream_max_attempts: read_parsed::<usize>(
                read("UPSTREAM_MAX_ATTEMPTS"),
                "UPSTREAM_MAX_ATTEMPTS",
            )
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_UPSTREAM_MAX_ATTEMPTS),
            data_api_base_url: read("DATA_API_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_DATA_API_BASE_URL.to_string()),
        })
    }
}

fn read_parsed<T: FromStr>(value: Option<String>, name: &str) -> Option<T> {
    let raw = value?;
    match raw.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("{name}={raw:?} is not a valid number, using the default.");
            None
        }
    }
}

fn resolve_bind_addr(app_addr: Option<String>, port: Option<String>) -> String {
    if let Some(configured) = app_addr {
        return configured;
    }

    if let Some(port) = port.and_then(|value| value.trim().parse::<u16>().ok()) {
        return format!("0.0.0.0:{port}");
    }

    DEFAULT_BIND_ADDR.to_string()
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
