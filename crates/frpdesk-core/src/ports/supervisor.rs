//! Process supervision port.
//!
//! The supervisor owns the child handles; callers interact by pid and
//! observe through the broadcast bus. Intent-based operations only, no
//! implementation-leaking signatures.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::events::ProcessEvent;

/// Grace period before a stop escalates to a force-kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Window to confirm a force-kill took effect.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(1);

/// What to launch: binary plus argv. Stdio is always piped and captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl SpawnSpec {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Rendered command line for logs and status output.
    pub fn display_line(&self) -> String {
        let mut line = self.command.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Lifecycle of one supervised child.
///
/// `Created` exists only inside `start`, between spawn and registration;
/// observers see `Running` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Created,
    Running,
    Stopping,
    Exited,
    Killed,
    Error,
}

impl ProcessStatus {
    /// Whether the process has reached a terminal state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited | Self::Killed | Self::Error)
    }

    /// Terminal status for an observed exit: `Killed` when the exit was
    /// forced by a kill request, `Exited` otherwise.
    pub const fn from_exit(forced: bool) -> Self {
        if forced { Self::Killed } else { Self::Exited }
    }
}

/// Externally visible snapshot of one supervised process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub pid: u32,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub status: ProcessStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Signal used for graceful stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    /// SIGTERM (or the platform equivalent).
    #[default]
    Term,
    /// SIGINT.
    Int,
}

/// Result of a graceful stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited within the grace period.
    Exited { code: Option<i32> },
    /// The grace period elapsed (or the pid was unmanaged) and the process
    /// was force-killed.
    ForceKilled,
}

/// Result of a confirmed force-kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillOutcome {
    /// Exit code when the exit was observed before confirmation, which is
    /// only possible for supervised pids.
    pub exit_code: Option<i32>,
}

/// Supervision failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The child could not be spawned or produced no pid.
    #[error("failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },

    /// Zero or otherwise unusable pid.
    #[error("invalid pid {0}")]
    InvalidPid(u32),

    /// The pid is neither supervised nor alive at the OS level.
    #[error("no such process: {0}")]
    NotFound(u32),

    /// Delivering a signal failed for a reason other than the process
    /// being gone.
    #[error("failed to signal {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    /// SIGKILL (or the platform equivalent) did not take the process down
    /// within the confirmation window.
    #[error("force-kill of {pid} did not complete: {reason}")]
    ForceKillFailed { pid: u32, reason: String },
}

/// Supervises external child processes: spawn, signal, reap, observe.
#[async_trait]
pub trait ProcessSupervisorPort: Send + Sync {
    /// Spawn and register a process, wiring output capture and exit
    /// handling. The summary carries the pid callers use from here on.
    async fn start(&self, spec: SpawnSpec) -> Result<ProcessSummary, SupervisorError>;

    /// Gracefully stop `pid`, escalating to a force-kill when `timeout`
    /// elapses. An unmanaged-but-alive pid (for example one left over from
    /// an earlier host process) is signalled and polled the same way; an
    /// unmanaged dead pid fails with [`SupervisorError::NotFound`].
    async fn stop(
        &self,
        pid: u32,
        timeout: Duration,
        signal: StopSignal,
    ) -> Result<StopOutcome, SupervisorError>;

    /// Kill `pid` (and its process tree where the platform allows),
    /// confirming death within `timeout`.
    async fn force_kill(&self, pid: u32, timeout: Duration)
    -> Result<KillOutcome, SupervisorError>;

    /// OS-level liveness. Probe failures other than "no such process"
    /// count as alive, so transient errors never report a live process as
    /// gone.
    async fn exists(&self, pid: u32) -> bool;

    /// Snapshot of currently supervised processes.
    async fn list_running(&self) -> Vec<ProcessSummary>;

    /// Subscribe to the event bus.
    fn subscribe(&self) -> broadcast::Receiver<ProcessEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_spec_builds_a_display_line() {
        let spec = SpawnSpec::new("/usr/bin/frpc")
            .arg("-c")
            .arg("/tmp/frpc-1.toml");
        assert_eq!(spec.display_line(), "/usr/bin/frpc -c /tmp/frpc-1.toml");
        assert_eq!(spec.args.len(), 2);
    }

    #[test]
    fn terminal_statuses() {
        assert!(ProcessStatus::Exited.is_terminal());
        assert!(ProcessStatus::Killed.is_terminal());
        assert!(ProcessStatus::Error.is_terminal());
        assert!(!ProcessStatus::Running.is_terminal());
        assert!(!ProcessStatus::Stopping.is_terminal());
    }

    #[test]
    fn exits_map_to_terminal_statuses() {
        assert_eq!(ProcessStatus::from_exit(false), ProcessStatus::Exited);
        assert_eq!(ProcessStatus::from_exit(true), ProcessStatus::Killed);
        assert!(ProcessStatus::from_exit(true).is_terminal());
    }
}
