use std::{io::ErrorKind, path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use tokio::{
    process::{Child, Command},
    time::timeout,
};
use tracing::debug;

use crate::{auth::AuthContext, error::ApiError, request::VideoId};

pub const AUDIO_ONLY_SELECTOR: &str = "bestaudio";

#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
    auth: Arc<AuthContext>,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(bin: impl Into<PathBuf>, auth: Arc<AuthContext>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            auth,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.bin);
        command
            .args(["--no-playlist", "--no-warnings"])
            .args(self.auth.extractor_args())
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!(
            "yt-dlp {:?} (authenticated: {})",
            args,
            self.auth.is_authenticated()
        );
        command
    }

    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, ApiError> {
        let output = timeout(self.timeout, self.command(&args).output())
            .await
            .map_err(|_| ApiError::timeout(format!("yt-dlp exceeded {:?}", self.timeout)))?
            .map_err(|error| spawn_error(&self.bin, error))?;

        if !output.status.success() {
            return Err(classify_failure(&output.stderr));
        }

        Ok(output.stdout)
    }

    pub async fn resolve_audio_url(&self, video_id: &VideoId) -> Result<String, ApiError> {
        let stdout = self
            .run(vec![
                "-f".to_string(),
                AUDIO_ONLY_SELECTOR.to_string(),
                "-g".to_string(),
                "--".to_string(),
                video_id.watch_url(),
            ])
            .await?;

        first_http_line(&stdout).ok_or_else(|| {
            ApiError::upstream_unavailable("no audio-only format is available for this video.")
        })
    }

    pub async fn dump_info(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.run(vec![
            "-J".to_string(),
            "--skip-download".to_string(),
            "--".to_string(),
            url.to_string(),
        ])
        .await
    }

    pub fn spawn_audio_pipe(&self, video_id: &VideoId) -> Result<Child, ApiError> {
        let args = [
            "-f".to_string(),
            AUDIO_ONLY_SELECTOR.to_string(),
            "--quiet".to_string(),
            "-o".to_string(),
            "-".to_string(),
            "--".to_string(),
            video_id.watch_url(),
        ];
        self.command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| spawn_error(&self.bin, error))
    }
}

fn spawn_error(bin: &std::path::Path, error: std::io::Error) -> ApiError {
    if error.kind() == ErrorKind::NotFound {
        ApiError::unknown(format!("{} is not installed", bin.display()))
    } else {
        ApiError::unknown(format!("could not run {}: {error}", bin.display()))
    }
}

fn first_http_line(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://") || line.starts_with("http://"))
        .map(ToString::to_string)
}

pub fn classify_failure(stderr: &[u8]) -> ApiError {
    let text = String::from_utf8_lossy(stderr);
    let message = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rfind(|line| line.starts_with("ERROR"))
        .or_else(|| text.lines().map(str::trim).rfind(|line| !line.is_empty()))
        .unwrap_or("yt-dlp failed without output")
        .to_string();
    let lower = message.to_ascii_lowercase();

    let unavailable = |reason: &str| ApiError::upstream_unavailable(reason).with_detail(message.clone());

    if lower.contains("private video") {
        unavailable("this video is private.")
    } else if lower.contains("available in your country")
        || lower.contains("geo restrict")
        || (lower.contains("geo") && lower.contains("block"))
    {
        unavailable("this video is not available in the server's region.")
    } else if lower.contains("confirm your age") || lower.contains("age-restricted") {
        unavailable("this video is age-restricted.")
    } else if lower.contains("copyright") {
        unavailable("this video was blocked on copyright grounds.")
    } else if lower.contains("requested format is not available")
        || lower.contains("no video formats")
    {
        unavailable("no audio-only format is available for this video.")
    } else if lower.contains("premieres in") || lower.contains("live event will begin") {
        unavailable("this video has not started yet.")
    } else if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("does not exist")
        || lower.contains("account associated with this video has been terminated")
    {
        unavailable("this video does not exist or was removed.")
    } else if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        ApiError::validation("Unsupported or invalid video URL.").with_detail(message)
    } else if lower.contains("http error 429")
        || lower.contains("too many requests")
        || lower.contains("http error 5")
        || lower.contains("timed out")
        || lower.contains("connection reset")
        || lower.contains("temporary failure in name resolution")
    {
        ApiError::unknown(message).transient()
    } else {
        ApiError::unknown(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn region_lock_is_an_upstream_problem() {
        let error = classify_failure(
            b"[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Video unavailable. The uploader has not made this video available in your country\n",
        );
        assert_eq!(error.kind, ErrorKind::UpstreamUnavailable);
        assert!(error.message.contains("region"));
        assert!(error.detail.unwrap().contains("available in your country"));
    }

    #[test]
    fn private_and_removed_videos_are_upstream_problems() {
        let private = classify_failure(b"ERROR: [youtube] abc: Private video. Sign in if you've been granted access");
        assert_eq!(private.kind, ErrorKind::UpstreamUnavailable);
        assert!(private.message.contains("private"));

        let removed = classify_failure(b"ERROR: [youtube] abc: Video unavailable");
        assert_eq!(removed.kind, ErrorKind::UpstreamUnavailable);

        let no_format = classify_failure(b"ERROR: [youtube] abc: Requested format is not available");
        assert!(no_format.message.contains("audio-only"));
    }

    #[test]
    fn rate_limits_are_transient_server_problems() {
        let error = classify_failure(b"ERROR: unable to download video data: HTTP Error 429: Too Many Requests");
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.transient);
    }

    #[test]
    fn unrecognised_failures_stay_generic() {
        let error = classify_failure(b"Traceback (most recent call last):\nKeyError: 'streamingData'\n");
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(!error.transient);
        assert_eq!(error.detail.as_deref(), Some("KeyError: 'streamingData'"));
    }

    #[test]
    fn picks_the_first_url_line() {
        let stdout = b"\nhttps://rr1.googlevideo.com/videoplayback?itag=251\n";
        assert_eq!(
            first_http_line(stdout).as_deref(),
            Some("https://rr1.googlevideo.com/videoplayback?itag=251")
        );
        assert_eq!(first_http_line(b"NA\n"), None);
    }

    #[tokio::test]
    async fn missing_binary_is_a_server_error() {
        let ytdlp = YtDlp::new(
            "/nonexistent/yt-dlp",
            Arc::new(AuthContext::anonymous()),
            Duration::from_secs(5),
        );
        let video_id = VideoId::parse(Some("dQw4w9WgXcQ")).unwrap();
        let error = ytdlp.resolve_audio_url(&video_id).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.detail.unwrap().contains("not installed"));
    }
}
