use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong on our side. Please try again later.";

/// Failure taxonomy shared by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    NotFound,
    UpstreamUnavailable,
    Encoding,
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Configuration | Self::UpstreamUnavailable | Self::Encoding | Self::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub transient: bool,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            transient: false,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn configuration(setting: &str) -> Self {
        Self::new(
            ErrorKind::Configuration,
            format!("Server is missing required configuration ({setting})."),
        )
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, "Video not found.")
    }

    /// The video itself cannot be served: private, removed, region-locked, or
    /// no audio-only format. `reason` is shown to the client.
    pub fn upstream_unavailable(reason: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::UpstreamUnavailable,
            format!("Video unavailable: {}", reason.as_ref()),
        )
    }

    pub fn encoding(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, "Audio conversion failed.").with_detail(detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Timeout,
            "The upstream service took too long to respond.",
        )
        .with_detail(detail)
        .transient()
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, GENERIC_FAILURE_MESSAGE).with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Marks the failure as worth retrying (network hiccup, 429, 5xx).
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{:?}: {} ({detail})", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs can carry the Data API key.
        let error = error.without_url();
        let retryable = error.is_timeout()
            || error.is_connect()
            || error
                .status()
                .is_some_and(|status| status.is_server_error() || status.as_u16() == 429);
        let converted = if error.is_timeout() {
            Self::timeout(error.to_string())
        } else {
            Self::unknown(format!("upstream HTTP request failed: {error}"))
        };

        if retryable {
            converted.transient()
        } else {
            converted
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.detail.as_deref().unwrap_or("-");
        match self.kind {
            ErrorKind::Validation | ErrorKind::NotFound => {
                warn!(kind = ?self.kind, detail, "{}", self.message);
            }
            _ => {
                error!(kind = ?self.kind, detail, "{}", self.message);
            }
        }

        let body = Json(ErrorBody {
            success: false,
            error: self.message,
        });

        (self.kind.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::configuration("YOUTUBE_API_KEY").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::upstream_unavailable("private").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::timeout("slow").status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn unknown_errors_do_not_leak_detail() {
        let error = ApiError::unknown("spawn failed: /usr/local/bin/yt-dlp permission denied");
        assert_eq!(error.message, GENERIC_FAILURE_MESSAGE);
        assert!(error.detail.unwrap().contains("permission denied"));
    }

    #[test]
    fn upstream_unavailable_message_names_the_video() {
        let error = ApiError::upstream_unavailable("this video is private.");
        assert!(error.message.starts_with("Video unavailable"));
        assert!(!error.transient);
    }

    #[test]
    fn timeouts_are_transient() {
        assert!(ApiError::timeout("acquire").transient);
    }
}
