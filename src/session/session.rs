//! Session orchestrator
//!
//! A session turns a series of short-lived tool invocations into one
//! resumable conversation. Each message spawns the tool once; continuity
//! comes from the resume token the tool hands back.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::types::{RelayError, Result, ToolDescriptor};

use super::command::build_command;
use super::launcher::{ProcessLauncher, SystemLauncher};
use super::output::{parse_output, redact_secrets, strip_ansi};
use super::state::{ConversationState, HistoryEntry, SessionInfo};
use super::WrappedChild;

/// Reply returned when a successful run printed nothing
pub const NO_OUTPUT: &str = "(no output)";
/// Error text when a failing tool printed nothing
const DEFAULT_FAILURE_MESSAGE: &str = "CLI exited with error";
/// Characters of failure output included in log lines
const LOG_PREVIEW_CHARS: usize = 200;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The in-flight run, present exactly while the session is busy
#[derive(Debug)]
struct RunningProcess {
    run_id: Uuid,
    pid: Option<u32>,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

/// Exclusive claim on a session's running slot
///
/// Dropping the guard is the only way the slot is released, so every exit
/// path of a run (success, failure, timeout, kill, or the caller dropping
/// the request) releases it exactly once.
struct RunGuard<'a> {
    session: &'a Session,
    run_id: Uuid,
    cancel: CancellationToken,
    finished: watch::Sender<bool>,
}

impl RunGuard<'_> {
    fn set_pid(&self, pid: Option<u32>) {
        if let Some(running) = lock(&self.session.running)
            .as_mut()
            .filter(|r| r.run_id == self.run_id)
        {
            running.pid = pid;
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        {
            let mut slot = lock(&self.session.running);
            if slot.as_ref().is_some_and(|r| r.run_id == self.run_id) {
                *slot = None;
            }
        }
        self.finished.send_replace(true);
    }
}

/// Captured result of a child that exited on its own
#[derive(Debug)]
struct CompletedRun {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[derive(Debug)]
enum RunOutcome {
    Completed(CompletedRun),
    TimedOut,
    Cancelled,
    Failed(io::Error),
}

/// One logical conversation with one external tool
pub struct Session {
    tool: Arc<ToolDescriptor>,
    cwd: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
    state: Mutex<ConversationState>,
    running: Mutex<Option<RunningProcess>>,
}

impl Session {
    /// Create a session that launches real processes
    pub fn new(tool: Arc<ToolDescriptor>, cwd: impl Into<PathBuf>) -> Self {
        Self::with_launcher(tool, cwd, Arc::new(SystemLauncher))
    }

    /// Create a session with a custom spawn primitive
    pub fn with_launcher(
        tool: Arc<ToolDescriptor>,
        cwd: impl Into<PathBuf>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            tool,
            cwd: cwd.into(),
            launcher,
            state: Mutex::new(ConversationState::default()),
            running: Mutex::new(None),
        }
    }

    /// The tool this session talks to
    pub fn tool(&self) -> &Arc<ToolDescriptor> {
        &self.tool
    }

    /// Working directory of every invocation
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Whether a tool process is currently running for this session
    pub fn is_busy(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Send one message and wait for the complete reply
    ///
    /// Fails with [`RelayError::AlreadyBusy`] without spawning anything when
    /// a request is already in flight. On any failure the conversation
    /// state is left exactly as it was, so the turn can be retried.
    pub async fn send_message(&self, message: &str) -> Result<String> {
        let guard = self.begin_run()?;
        let span = tracing::info_span!(
            "send_message",
            tool = %self.tool.id,
            run_id = %guard.run_id,
        );
        self.run_turn(&guard, message).instrument(span).await
    }

    /// Kill the running tool process, if any
    ///
    /// Returns `false` when idle. Otherwise returns `true` once the process
    /// has been killed and the session is idle again. The conversation
    /// itself is untouched.
    pub async fn kill(&self) -> bool {
        let Some((cancel, mut finished)) = self.running_handles() else {
            return false;
        };

        tracing::info!(tool = %self.tool.id, "Killing running tool process");
        cancel.cancel();
        // Err only if the run already released the slot
        drop(finished.wait_for(|done| *done).await);
        true
    }

    /// Kill any running process and forget the conversation
    pub async fn reset(&self) {
        let killed = self.kill().await;
        lock(&self.state).reset();
        tracing::info!(
            tool = %self.tool.id,
            killed,
            "Session reset, next message starts a new conversation"
        );
    }

    /// Tear-down hook for the owning context; leaves no child behind
    pub async fn cleanup(&self) -> bool {
        let killed = self.kill().await;
        if killed {
            tracing::info!(tool = %self.tool.id, "Killed running tool process during cleanup");
        } else {
            tracing::debug!(tool = %self.tool.id, "Session cleanup (nothing to stop)");
        }
        killed
    }

    /// Snapshot of the session; never waits for the running process
    pub fn info(&self) -> SessionInfo {
        let (busy, pid) = {
            let slot = lock(&self.running);
            (slot.is_some(), slot.as_ref().and_then(|r| r.pid))
        };
        let state = lock(&self.state);

        SessionInfo {
            tool_id: self.tool.id.clone(),
            tool_name: self.tool.name.clone(),
            cwd: self.cwd.clone(),
            busy,
            pid,
            message_count: state.message_count,
            started_at: state.started_at,
            resume_token: state.resume_token.clone(),
            stats: state.stats.clone(),
        }
    }

    /// Most recent history entries, oldest first
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let state = lock(&self.state);
        let skip = limit.map_or(0, |limit| state.history.len().saturating_sub(limit));
        state.history.iter().skip(skip).cloned().collect()
    }

    fn begin_run(&self) -> Result<RunGuard<'_>> {
        let mut slot = lock(&self.running);
        if slot.is_some() {
            tracing::debug!(tool = %self.tool.id, "Rejecting message, session is busy");
            return Err(RelayError::AlreadyBusy);
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);
        *slot = Some(RunningProcess {
            run_id,
            pid: None,
            cancel: cancel.clone(),
            finished: finished_rx,
        });

        Ok(RunGuard {
            session: self,
            run_id,
            cancel,
            finished: finished_tx,
        })
    }

    fn running_handles(&self) -> Option<(CancellationToken, watch::Receiver<bool>)> {
        lock(&self.running)
            .as_ref()
            .map(|r| (r.cancel.clone(), r.finished.clone()))
    }

    async fn run_turn(&self, guard: &RunGuard<'_>, message: &str) -> Result<String> {
        let resume_token = lock(&self.state).resume_token.clone();
        let argv = build_command(&self.tool, message, resume_token.as_deref());

        tracing::info!(
            cwd = %self.cwd.display(),
            resuming = resume_token.is_some(),
            message_chars = message.chars().count(),
            "Launching tool"
        );
        tracing::debug!(argv = ?argv, "Tool command");

        let mut child = self
            .launcher
            .launch(&argv, &self.cwd)
            .map_err(|e| self.launch_error(e))?;
        guard.set_pid(child.id());

        let started = Instant::now();
        let max_duration = self.tool.max_duration;

        match supervise(&mut child, max_duration, &guard.cancel).await {
            RunOutcome::Completed(run) => {
                tracing::info!(
                    exit_code = ?run.status.code(),
                    elapsed_ms = started.elapsed().as_millis(),
                    stdout_bytes = run.stdout.len(),
                    stderr_bytes = run.stderr.len(),
                    "Tool exited"
                );
                self.finish_turn(message, run)
            }
            RunOutcome::TimedOut => {
                tracing::warn!(
                    timeout_secs = max_duration.as_secs_f64(),
                    "Tool timed out, killing process"
                );
                terminate(&mut child).await;
                Err(RelayError::Timeout(max_duration))
            }
            RunOutcome::Cancelled => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis(),
                    "Run cancelled, killing process"
                );
                terminate(&mut child).await;
                Err(RelayError::Cancelled)
            }
            RunOutcome::Failed(e) => {
                tracing::error!(error = %e, "Failed while waiting for tool");
                if matches!(child.try_wait(), Ok(None)) {
                    terminate(&mut child).await;
                }
                Err(RelayError::execution_after_spawn(&self.tool.id, e))
            }
        }
    }

    fn launch_error(&self, err: io::Error) -> RelayError {
        if err.kind() == io::ErrorKind::NotFound {
            tracing::warn!(command = %self.tool.command, "Tool binary not found");
            RelayError::not_installed(&self.tool.id)
        } else {
            tracing::error!(command = %self.tool.command, error = %err, "Failed to spawn tool");
            RelayError::execution(&self.tool.id, err)
        }
    }

    fn finish_turn(&self, message: &str, run: CompletedRun) -> Result<String> {
        let stdout = String::from_utf8_lossy(&run.stdout);

        if !run.status.success() {
            let stderr = strip_ansi(&String::from_utf8_lossy(&run.stderr));
            let stdout = strip_ansi(&stdout);
            let detail = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|text| !text.is_empty())
                .unwrap_or(DEFAULT_FAILURE_MESSAGE);
            let detail = redact_secrets(detail);

            tracing::warn!(
                exit_code = ?run.status.code(),
                "Tool exited with failure: {}",
                detail.chars().take(LOG_PREVIEW_CHARS).collect::<String>()
            );
            return Err(RelayError::NonZeroExit {
                code: run.status.code(),
                message: detail,
            });
        }

        let output = parse_output(&self.tool, &stdout);
        {
            let mut state = lock(&self.state);
            state.record_success(message, &output, Utc::now());
            tracing::info!(
                reply_chars = output.reply.chars().count(),
                message_count = state.message_count,
                new_resume_token = output.resume_token.is_some(),
                "Turn complete"
            );
        }

        let reply = output.reply.trim();
        Ok(if reply.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            reply.to_string()
        })
    }
}

/// Race the child against its deadline and the cancellation token
async fn supervise(
    child: &mut WrappedChild,
    max_duration: Duration,
    cancel: &CancellationToken,
) -> RunOutcome {
    let stdout = child.take_stdout();
    let stderr = child.take_stderr();

    let run = async {
        let (stdout, stderr, status) = tokio::join!(drain(stdout), drain(stderr), child.wait());
        Ok::<_, io::Error>(CompletedRun {
            status: status?,
            stdout: stdout?,
            stderr: stderr?,
        })
    };

    tokio::select! {
        result = run => match result {
            Ok(run) => RunOutcome::Completed(run),
            Err(e) => RunOutcome::Failed(e),
        },
        () = tokio::time::sleep(max_duration) => RunOutcome::TimedOut,
        () = cancel.cancelled() => RunOutcome::Cancelled,
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the process group without grace period and reap it
async fn terminate(child: &mut WrappedChild) {
    let pid = child.id();
    match child.kill().await {
        Ok(()) => tracing::debug!(pid = ?pid, "Tool process killed"),
        Err(e) => tracing::warn!(pid = ?pid, error = %e, "Failed to kill tool process"),
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tool", &self.tool.id)
            .field("cwd", &self.cwd)
            .field("busy", &self.is_busy())
            .finish()
    }
}
