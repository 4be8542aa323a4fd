use std::{collections::VecDeque, future::Future};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    task::JoinHandle,
};
use tracing::debug;

const STDERR_TAIL_LINES: usize = 20;

/// A spawned task that is aborted when the guard is dropped, so helper tasks
/// never outlive the response that needed them.
pub struct TaskGuard<T>(Option<JoinHandle<T>>);

impl<T: Send + 'static> TaskGuard<T> {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self(Some(tokio::spawn(future)))
    }

    /// Waits for the task; `None` if it panicked or was aborted.
    pub async fn join(mut self) -> Option<T> {
        let handle = self.0.take()?;
        handle.await.ok()
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Collects the last lines a child wrote to stderr.
pub async fn collect_stderr_tail<R>(stderr: R, program: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        debug!("{program}: {line}");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn keeps_only_the_last_lines() {
        let input = (0..30).map(|index| format!("line {index}\n")).collect::<String>();
        let tail = collect_stderr_tail(input.as_bytes(), "test").await;
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(lines.first(), Some(&"line 10"));
        assert_eq!(lines.last(), Some(&"line 29"));
    }

    #[tokio::test]
    async fn dropping_the_guard_aborts_the_task() {
        let (sender, receiver) = tokio::sync::oneshot::channel::<()>();
        let guard = TaskGuard::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let _ = sender.send(());
        });
        drop(guard);
        assert!(receiver.await.is_err());
    }

    #[tokio::test]
    async fn join_returns_the_output() {
        let guard = TaskGuard::spawn(async { 42 });
        assert_eq!(guard.join().await, Some(42));
    }
}
