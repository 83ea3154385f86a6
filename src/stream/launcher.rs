//! Player launcher
//!
//! Spawns the external player (livestreamer, streamlink, ...) for an entry
//! and supervises it. The player gets `[url, quality]` as arguments; its
//! stdout and stderr are forwarded line by line as [`Event::Output`], and its
//! end is reported as [`Event::Exited`].
//!
//! Per entry: `Idle -> Launching -> Running -> Idle`. A failed spawn goes
//! straight from `Launching` back to `Idle`.

use std::collections::{HashMap, VecDeque};
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Event, ExitKind};
use crate::models::{EntryKey, StreamEntry};

/// Time a player gets to exit after SIGTERM before it is killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Time allowed for output readers to drain after the player exits
const OUTPUT_DRAIN: Duration = Duration::from_secs(1);

/// Output lines kept per run for the log file
const MAX_LOG_LINES: usize = 2000;

/// Errors from starting a player
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("{0} not found")]
    ExecutableNotFound(String),

    #[error("Failed to start {path}: {source}")]
    StartFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launch state of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Idle,
    Launching,
    Running,
}

struct Tracked {
    state: WatchState,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    log: VecDeque<String>,
}

impl Tracked {
    fn launching() -> Self {
        Self {
            state: WatchState::Launching,
            stop: None,
            task: None,
            log: VecDeque::new(),
        }
    }
}

/// Tracks at most one player process per entry
pub struct Launcher {
    events: UnboundedSender<Event>,
    tracked: HashMap<EntryKey, Tracked>,
    stopping: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl Launcher {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self {
            events,
            tracked: HashMap::new(),
            stopping: Vec::new(),
            grace: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn set_grace_period(&mut self, grace: Duration) {
        self.grace = grace;
    }

    pub fn state(&self, key: EntryKey) -> WatchState {
        self.tracked
            .get(&key)
            .map(|t| t.state)
            .unwrap_or_default()
    }

    pub fn is_running(&self, key: EntryKey) -> bool {
        self.state(key) == WatchState::Running
    }

    /// Number of tracked players
    pub fn running(&self) -> usize {
        self.tracked.len()
    }

    /// Start the player for `entry`. Never waits for the player to exit.
    pub fn watch(
        &mut self,
        entry: &mut StreamEntry,
        executable: &str,
        quality: &str,
    ) -> Result<(), LaunchError> {
        let key = entry.key;
        if self.tracked.contains_key(&key) {
            return Err(LaunchError::AlreadyRunning(entry.display_name.clone()));
        }
        self.tracked.insert(key, Tracked::launching());

        let spawned = Command::new(executable)
            .arg(&entry.url)
            .arg(quality)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.tracked.remove(&key);
                warn!(executable, error = %e, "failed to start player");
                return Err(match e.kind() {
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                        LaunchError::ExecutableNotFound(executable.to_string())
                    }
                    _ => LaunchError::StartFailed {
                        path: executable.to_string(),
                        source: e,
                    },
                });
            }
        };

        info!(channel = %entry.display_name, quality, pid = ?child.id(), "player started");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, key, self.events.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, key, self.events.clone()));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(supervise(
            child,
            stop_rx,
            readers,
            key,
            self.events.clone(),
            self.grace,
        ));

        if let Some(tracked) = self.tracked.get_mut(&key) {
            tracked.state = WatchState::Running;
            tracked.stop = Some(stop_tx);
            tracked.task = Some(task);
        }
        entry.watching = true;
        Ok(())
    }

    /// Keep a line of the player's output for its log
    pub fn record_output(&mut self, key: EntryKey, line: &str) -> bool {
        let Some(tracked) = self.tracked.get_mut(&key) else {
            return false;
        };
        if tracked.log.len() == MAX_LOG_LINES {
            tracked.log.pop_front();
        }
        tracked.log.push_back(line.to_string());
        true
    }

    /// Forget a player that exited on its own, returning its output.
    ///
    /// Returns `None` if the player was already terminated or finished, so
    /// the exit path and the removal path never both report the same run.
    pub fn finish(&mut self, key: EntryKey) -> Option<Vec<String>> {
        self.tracked
            .remove(&key)
            .map(|tracked| tracked.log.into_iter().collect())
    }

    /// Stop the player for `key` if one is tracked. Idempotent.
    pub fn terminate(&mut self, key: EntryKey) -> bool {
        let Some(mut tracked) = self.tracked.remove(&key) else {
            return false;
        };
        debug!(%key, "terminating player");
        if let Some(stop) = tracked.stop.take() {
            let _ = stop.send(());
        }
        self.stopping.retain(|task| !task.is_finished());
        if let Some(task) = tracked.task.take() {
            self.stopping.push(task);
        }
        true
    }

    /// Terminate every player and wait until they are all gone
    pub async fn shutdown(&mut self) {
        let keys: Vec<EntryKey> = self.tracked.keys().copied().collect();
        for key in keys {
            self.terminate(key);
        }
        join_all(self.stopping.drain(..)).await;
    }
}

/// Qualities announced by the player, from a line like
/// `[cli][info] Available streams: audio, 480p, 720p (best)`
pub fn parse_available_streams(line: &str) -> Option<Vec<String>> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^\[cli\]\[info\] Available streams: (.+)$").ok())
        .as_ref()?;
    let list = pattern.captures(line.trim())?.get(1)?.as_str();
    Some(
        list.split(',')
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect(),
    )
}

/// Forward output lines until EOF. Bytes that are not UTF-8 are replaced,
/// and the pipe stays open even if nobody listens so the player never gets
/// SIGPIPE.
fn forward_lines<R>(reader: R, key: EntryKey, events: UnboundedSender<Event>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    // Receiver gone means the session shut down; keep draining
                    let _ = events.send(Event::Output {
                        key,
                        line: line.to_string(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(%key, error = %e, "lost player output");
                    break;
                }
            }
        }
    })
}

async fn supervise(
    mut child: Child,
    stop: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    key: EntryKey,
    events: UnboundedSender<Event>,
    grace: Duration,
) {
    // A dropped sender counts as a stop request too
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop => None,
    };

    let kind = match waited {
        Some(Ok(status)) => exit_kind(status),
        Some(Err(e)) => {
            warn!(%key, error = %e, "lost track of player");
            ExitKind::Crashed { code: None }
        }
        None => {
            stop_child(&mut child, grace).await;
            ExitKind::Terminated
        }
    };
    debug!(%key, ?kind, "player exited");

    let _ = tokio::time::timeout(OUTPUT_DRAIN, join_all(readers)).await;
    let _ = events.send(Event::Exited { key, kind });
}

fn exit_kind(status: ExitStatus) -> ExitKind {
    if status.success() {
        ExitKind::Clean
    } else {
        ExitKind::Crashed {
            code: status.code(),
        }
    }
}

/// Ask politely, then kill
async fn stop_child(child: &mut Child, grace: Duration) {
    if request_exit(child) && tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill player");
    }
}

#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    match child.id() {
        // SAFETY: the pid belongs to our own child, which has not been reaped
        // yet because `child.wait()` has not returned.
        Some(pid) => unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_untracked_entry_is_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let launcher = Launcher::new(tx);
        assert_eq!(launcher.state(EntryKey::new()), WatchState::Idle);
        assert_eq!(launcher.running(), 0);
    }

    #[test]
    fn test_terminate_and_finish_untracked_are_noops() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut launcher = Launcher::new(tx);
        let key = EntryKey::new();
        assert!(!launcher.terminate(key));
        assert!(launcher.finish(key).is_none());
        assert!(!launcher.record_output(key, "hello"));
    }

    #[test]
    fn test_parse_available_streams() {
        let line = "[cli][info] Available streams: audio, 480p, 720p (worst), 1080p (best)";
        assert_eq!(
            parse_available_streams(line).unwrap(),
            vec!["audio", "480p", "720p (worst)", "1080p (best)"]
        );
        assert!(parse_available_streams("[cli][info] Opening stream: 720p").is_none());
        assert!(parse_available_streams("Available streams: a, b").is_none());
    }

    #[tokio::test]
    async fn test_forward_lines_replaces_invalid_utf8() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key = EntryKey::new();
        let output: &'static [u8] = b"Caf\xe9\n\nnext line\r\n";

        forward_lines(output, key, tx).await.unwrap();

        let mut lines = Vec::new();
        while let Ok(Event::Output { line, .. }) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["Caf\u{FFFD}", "next line"]);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut launcher = Launcher::new(tx);
        let resolved = crate::provider::classify("https://twitch.tv/a").unwrap();
        let mut entry = StreamEntry::new(resolved, "best");

        let err = launcher
            .watch(&mut entry, "/nonexistent/streamwatch-player", "best")
            .unwrap_err();
        assert!(matches!(err, LaunchError::ExecutableNotFound(_)));
        assert_eq!(launcher.state(entry.key), WatchState::Idle);
        assert!(!entry.watching);
    }
}
