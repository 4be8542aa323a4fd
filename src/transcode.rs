use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    pin::Pin,
    process::Stdio,
    time::Duration,
};

use async_stream::try_stream;
use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::{
    io::AsyncWriteExt,
    process::{Child, ChildStdout, Command},
    time::{Instant, timeout_at},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{
    error::ApiError,
    process::{TaskGuard, collect_stderr_tail},
    source::AudioStream,
};

pub const MP3_BITRATE_KBPS: u32 = 128;

/// Encoded output, produced incrementally. An `Err` item means the encoding
/// failed after output had already started.
pub type EncodedStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: AudioStream) -> Result<EncodedStream, ApiError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    bin: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

pub fn ffmpeg_args(bitrate_kbps: u32) -> Vec<String> {
    let bitrate = format!("{bitrate_kbps}k");
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-vn",
        "-acodec",
        "libmp3lame",
        "-b:a",
        bitrate.as_str(),
        "-f",
        "mp3",
        "pipe:1",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: AudioStream) -> Result<EncodedStream, ApiError> {
        let mut command = Command::new(&self.bin);
        command.args(ffmpeg_args(MP3_BITRATE_KBPS));
        debug!("{} {:?}", self.bin.display(), ffmpeg_args(MP3_BITRATE_KBPS));

        encode_with(command, input, Instant::now() + self.timeout).map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ApiError::unknown(format!("{} is not installed", self.bin.display()))
            } else {
                ApiError::unknown(format!("could not start {}: {error}", self.bin.display()))
            }
        })
    }
}

/// Dropping the returned stream kills the encoder and releases `input`.
fn encode_with(
    mut command: Command,
    input: AudioStream,
    deadline: Instant,
) -> io::Result<EncodedStream> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| io::Error::other("stdin not captured"))?;
    let stdout = child.stdout.take().ok_or_else(|| io::Error::other("stdout not captured"))?;
    let stderr = child.stderr.take().ok_or_else(|| io::Error::other("stderr not captured"))?;

    let feeder = TaskGuard::spawn(async move {
        let mut input = input;
        let mut stdin = stdin;
        let copied = tokio::io::copy(&mut input, &mut stdin).await;
        let _ = stdin.shutdown().await;
        copied
    });
    let stderr_tail = TaskGuard::spawn(collect_stderr_tail(stderr, "ffmpeg"));

    Ok(Box::pin(encoded_output(
        child,
        stdout,
        feeder,
        stderr_tail,
        deadline,
    )))
}

fn encoded_output(
    child: Child,
    stdout: ChildStdout,
    feeder: TaskGuard<io::Result<u64>>,
    stderr_tail: TaskGuard<String>,
    deadline: Instant,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    try_stream! {
        let mut chunks = ReaderStream::new(stdout);
        loop {
            let next = timeout_at(deadline, chunks.next())
                .await
                .map_err(|_| timed_out("transcoding exceeded its time limit"))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            yield chunk;
        }

        finish(child, feeder, stderr_tail, deadline).await?;
    }
}

/// Exit status first: a failed encoder is reported as such even while the
/// upstream read is still pending.
async fn finish(
    mut child: Child,
    feeder: TaskGuard<io::Result<u64>>,
    stderr_tail: TaskGuard<String>,
    deadline: Instant,
) -> io::Result<()> {
    let status = timeout_at(deadline, child.wait())
        .await
        .map_err(|_| timed_out("encoder did not exit in time"))??;

    if !status.success() {
        drop(feeder);
        let tail = timeout_at(deadline, stderr_tail.join())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        return Err(io::Error::other(format!("encoder exited with {status}: {tail}")));
    }

    match timeout_at(deadline, feeder.join()).await {
        Err(_) => Err(timed_out("upstream audio did not finish in time")),
        Ok(Some(Err(error))) if error.kind() != ErrorKind::BrokenPipe => {
            Err(io::Error::other(format!("upstream audio failed: {error}")))
        }
        Ok(_) => Ok(()),
    }
}

fn timed_out(message: &'static str) -> io::Error {
    io::Error::new(ErrorKind::TimedOut, message)
}
