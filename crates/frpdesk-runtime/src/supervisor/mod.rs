//! Child-process supervision.
//!
//! One supervisor owns every spawned frp binary: a registry keyed by pid,
//! one waiter task per child that reaps it and announces the exit, and one
//! reader task per stdio stream. Callers hold pids, never child handles.

mod probe;
mod shutdown;
mod stream;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use frpdesk_core::domain::{LogBuffer, LogEntry, LogStream};
use frpdesk_core::events::{ExitInfo, ProcessEvent};
use frpdesk_core::ports::{
    DEFAULT_KILL_TIMEOUT, KillOutcome, ProcessStatus, ProcessSummary, ProcessSupervisorPort,
    SpawnSpec, StopOutcome, StopSignal, SupervisorError,
};

const EVENT_CAPACITY: usize = 256;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registry record for one live child.
struct TrackedProcess {
    summary: ProcessSummary,
    output: Arc<Mutex<LogBuffer>>,
    kill_requested: Arc<AtomicBool>,
}

/// Supervises frp child processes and broadcasts their lifecycle.
///
/// Exits remove the registry entry before the `Exited` event goes out, so
/// an observed exit means the pid is already absent from every snapshot.
pub struct ProcessSupervisor {
    registry: Arc<Mutex<HashMap<u32, TrackedProcess>>>,
    events: broadcast::Sender<ProcessEvent>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Copy of a supervised process's captured output, `None` once the
    /// process has exited and left the registry.
    pub fn output_log(&self, pid: u32) -> Option<Vec<LogEntry>> {
        let registry = lock(&self.registry);
        let tracked = registry.get(&pid)?;
        let output = tracked
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Some(output.to_vec())
    }

    fn spawn_waiter(&self, mut child: Child, pid: u32, kill_requested: Arc<AtomicBool>) {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = child.wait().await;

            // Remove before broadcasting: an observed exit must never race
            // a registry snapshot that still lists the pid. The record
            // leaves the map stamped with its terminal state.
            let tracked = lock(&registry).remove(&pid);

            match result {
                Ok(status) => {
                    let info = ExitInfo {
                        code: status.code(),
                        forced: kill_requested.load(Ordering::SeqCst),
                    };
                    let terminal = ProcessStatus::from_exit(info.forced);
                    if let Some(mut tracked) = tracked {
                        tracked.summary.status = terminal;
                        tracked.summary.exit_code = info.code;
                    }
                    info!(pid, status = ?terminal, outcome = %info.describe(), "process exited");
                    let _ = events.send(ProcessEvent::Exited { pid, info });
                }
                Err(e) => {
                    if let Some(mut tracked) = tracked {
                        tracked.summary.status = ProcessStatus::Error;
                        tracked.summary.last_error = Some(e.to_string());
                    }
                    warn!(pid, error = %e, "waiting on process failed");
                    let _ = events.send(ProcessEvent::Error {
                        pid,
                        message: e.to_string(),
                    });
                }
            }
        });
    }

    /// Stop a pid that has no registry entry, e.g. one recorded by an
    /// earlier host process. No child handle means no reaping here;
    /// liveness is settled through the probe.
    async fn stop_unmanaged(
        &self,
        pid: u32,
        timeout: Duration,
        signal: StopSignal,
    ) -> Result<StopOutcome, SupervisorError> {
        if !probe::pid_exists(pid) {
            return Err(SupervisorError::NotFound(pid));
        }

        debug!(pid, "stopping unmanaged process");
        match shutdown::send_stop_signal(pid, signal)? {
            shutdown::Delivery::AlreadyGone => return Ok(StopOutcome::Exited { code: None }),
            shutdown::Delivery::Delivered => {}
        }

        if wait_for_death(pid, timeout).await {
            return Ok(StopOutcome::Exited { code: None });
        }

        warn!(pid, "unmanaged process ignored the stop signal, escalating");
        self.kill_unmanaged(pid, DEFAULT_KILL_TIMEOUT).await?;
        Ok(StopOutcome::ForceKilled)
    }

    async fn kill_unmanaged(
        &self,
        pid: u32,
        timeout: Duration,
    ) -> Result<KillOutcome, SupervisorError> {
        if !probe::pid_exists(pid) {
            return Ok(KillOutcome { exit_code: None });
        }

        match shutdown::send_kill(pid)? {
            shutdown::Delivery::AlreadyGone => return Ok(KillOutcome { exit_code: None }),
            shutdown::Delivery::Delivered => {}
        }

        if wait_for_death(pid, timeout).await {
            Ok(KillOutcome { exit_code: None })
        } else {
            Err(SupervisorError::ForceKillFailed {
                pid,
                reason: "did not exit after SIGKILL".to_string(),
            })
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSupervisorPort for ProcessSupervisor {
    async fn start(&self, spec: SpawnSpec) -> Result<ProcessSummary, SupervisorError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a force-kill can take the whole tree.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| SupervisorError::Spawn {
            command: spec.display_line(),
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| SupervisorError::Spawn {
            command: spec.display_line(),
            reason: "no pid reported for spawned child".to_string(),
        })?;

        let mut summary = ProcessSummary {
            pid,
            command: spec.command.clone(),
            args: spec.args.clone(),
            status: ProcessStatus::Created,
            started_at: Utc::now(),
            exit_code: None,
            last_error: None,
        };

        let output = Arc::new(Mutex::new(LogBuffer::new()));
        if let Some(stdout) = child.stdout.take() {
            stream::spawn_line_reader(
                stdout,
                pid,
                LogStream::Stdout,
                Arc::clone(&output),
                self.events.clone(),
            );
        }
        if let Some(stderr) = child.stderr.take() {
            stream::spawn_line_reader(
                stderr,
                pid,
                LogStream::Stderr,
                Arc::clone(&output),
                self.events.clone(),
            );
        }

        let kill_requested = Arc::new(AtomicBool::new(false));
        summary.status = ProcessStatus::Running;
        lock(&self.registry).insert(
            pid,
            TrackedProcess {
                summary: summary.clone(),
                output,
                kill_requested: Arc::clone(&kill_requested),
            },
        );

        info!(pid, command = %spec.display_line(), "process started");
        let _ = self.events.send(ProcessEvent::Started { pid });
        self.spawn_waiter(child, pid, kill_requested);

        Ok(summary)
    }

    async fn stop(
        &self,
        pid: u32,
        timeout: Duration,
        signal: StopSignal,
    ) -> Result<StopOutcome, SupervisorError> {
        if pid == 0 {
            return Err(SupervisorError::InvalidPid(pid));
        }

        // Subscribe while the entry is still present: exits remove the
        // entry before they broadcast, so a live entry means the exit
        // event is still ahead of this receiver.
        let rx = {
            let mut registry = lock(&self.registry);
            registry.get_mut(&pid).map(|tracked| {
                tracked.summary.status = ProcessStatus::Stopping;
                self.events.subscribe()
            })
        };
        let Some(rx) = rx else {
            return self.stop_unmanaged(pid, timeout, signal).await;
        };

        info!(pid, "stopping process");
        let _ = self.events.send(ProcessEvent::Stopping { pid });

        match shutdown::send_stop_signal(pid, signal) {
            // An already-gone target settles through the exit event below.
            Ok(shutdown::Delivery::Delivered | shutdown::Delivery::AlreadyGone) => {}
            Err(e) => {
                warn!(pid, error = %e, "stop signal failed, escalating");
                self.force_kill(pid, DEFAULT_KILL_TIMEOUT).await?;
                return Ok(StopOutcome::ForceKilled);
            }
        }

        if let Some(info) = wait_for_exit(rx, pid, timeout).await {
            return Ok(StopOutcome::Exited { code: info.code });
        }

        warn!(pid, "graceful stop timed out, escalating");
        self.force_kill(pid, DEFAULT_KILL_TIMEOUT).await?;
        Ok(StopOutcome::ForceKilled)
    }

    async fn force_kill(
        &self,
        pid: u32,
        timeout: Duration,
    ) -> Result<KillOutcome, SupervisorError> {
        if pid == 0 {
            return Err(SupervisorError::InvalidPid(pid));
        }

        let rx = {
            let mut registry = lock(&self.registry);
            registry.get_mut(&pid).map(|tracked| {
                // Tag first so the waiter reports the exit as forced.
                tracked.kill_requested.store(true, Ordering::SeqCst);
                self.events.subscribe()
            })
        };
        let Some(rx) = rx else {
            return self.kill_unmanaged(pid, timeout).await;
        };

        info!(pid, "force-killing process");
        shutdown::send_kill(pid)?;

        if let Some(info) = wait_for_exit(rx, pid, timeout).await {
            return Ok(KillOutcome {
                exit_code: info.code,
            });
        }

        // The waiter missed the window; trust the probe before declaring
        // failure.
        if probe::pid_exists(pid) {
            Err(SupervisorError::ForceKillFailed {
                pid,
                reason: "did not exit after SIGKILL".to_string(),
            })
        } else {
            Ok(KillOutcome { exit_code: None })
        }
    }

    async fn exists(&self, pid: u32) -> bool {
        probe::pid_exists(pid)
    }

    async fn list_running(&self) -> Vec<ProcessSummary> {
        let mut summaries: Vec<ProcessSummary> = lock(&self.registry)
            .values()
            .map(|tracked| tracked.summary.clone())
            .collect();
        summaries.sort_by_key(|summary| summary.pid);
        summaries
    }

    fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Await the exit of `pid` on the bus, bounded by `timeout`. `None` means
/// no exit was observed before the deadline.
async fn wait_for_exit(
    mut rx: broadcast::Receiver<ProcessEvent>,
    pid: u32,
    timeout: Duration,
) -> Option<ExitInfo> {
    let deadline = Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(ProcessEvent::Exited { pid: exited, info })) if exited == pid => {
                return Some(info);
            }
            Ok(Ok(ProcessEvent::Error { pid: errored, .. })) if errored == pid => return None,
            Ok(Ok(_)) => {}
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

/// Poll the liveness probe until `pid` is gone or `timeout` elapses.
async fn wait_for_death(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while probe::pid_exists(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_until_exit(
        mut rx: broadcast::Receiver<ProcessEvent>,
        pid: u32,
    ) -> Vec<ProcessEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for process events")
                .expect("event bus closed");
            if event.pid() != pid {
                continue;
            }
            let terminal = matches!(
                event,
                ProcessEvent::Exited { .. } | ProcessEvent::Error { .. }
            );
            seen.push(event);
            if terminal {
                return seen;
            }
        }
    }

    #[cfg(unix)]
    fn shell(script: &str) -> SpawnSpec {
        SpawnSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn start_captures_output_and_announces_the_exit() {
        let sup = ProcessSupervisor::new();
        let rx = sup.subscribe();

        let summary = sup
            .start(shell("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(summary.status, ProcessStatus::Running);

        let events = collect_until_exit(rx, summary.pid).await;
        assert!(matches!(events[0], ProcessEvent::Started { .. }));

        let lines: Vec<(LogStream, String)> = events
            .iter()
            .filter_map(|event| match event {
                ProcessEvent::Output { entry, .. } => Some((entry.stream, entry.text.clone())),
                _ => None,
            })
            .collect();
        assert!(lines.contains(&(LogStream::Stdout, "out".to_string())));
        assert!(lines.contains(&(LogStream::Stderr, "err".to_string())));

        match events.last().unwrap() {
            ProcessEvent::Exited { info, .. } => {
                assert_eq!(info.code, Some(3));
                assert!(!info.forced);
            }
            other => panic!("expected an exit, got {other:?}"),
        }
        assert!(sup.list_running().await.is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn stop_terminates_and_unlists_a_sleeping_process() {
        let sup = ProcessSupervisor::new();
        let summary = sup.start(SpawnSpec::new("sleep").arg("30")).await.unwrap();
        let pid = summary.pid;

        assert!(sup.exists(pid).await);
        let listed = sup.list_running().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pid, pid);
        assert!(sup.output_log(pid).is_some());

        let outcome = sup
            .stop(pid, Duration::from_secs(5), StopSignal::Term)
            .await
            .unwrap();

        // sleep dies to the signal itself, so there is no exit code.
        assert_eq!(outcome, StopOutcome::Exited { code: None });
        assert!(!sup.exists(pid).await);
        assert!(sup.list_running().await.is_empty());
        assert!(sup.output_log(pid).is_none());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn stop_escalates_when_term_is_ignored() {
        let sup = ProcessSupervisor::new();
        let mut rx = sup.subscribe();
        let summary = sup
            .start(shell(r#"trap "" TERM; echo armed; while :; do sleep 0.2; done"#))
            .await
            .unwrap();
        let pid = summary.pid;

        // Only signal once the shell reports the trap is in place; a TERM
        // delivered before that would terminate the process gracefully.
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for the trap to arm")
                .expect("event bus closed");
            if let ProcessEvent::Output { pid: seen, entry } = &event
                && *seen == pid
                && entry.text == "armed"
            {
                break;
            }
        }

        let outcome = sup
            .stop(pid, Duration::from_millis(300), StopSignal::Term)
            .await
            .unwrap();
        assert_eq!(outcome, StopOutcome::ForceKilled);

        let events = collect_until_exit(rx, pid).await;
        match events.last().unwrap() {
            ProcessEvent::Exited { info, .. } => assert!(info.forced),
            other => panic!("expected an exit, got {other:?}"),
        }
        assert!(!sup.exists(pid).await);
    }

    #[tokio::test]
    async fn stopping_an_unknown_dead_pid_is_not_found() {
        let sup = ProcessSupervisor::new();
        let err = sup
            .stop(999_999_999, Duration::from_secs(1), StopSignal::Term)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(999_999_999)));
    }

    #[tokio::test]
    async fn force_kill_of_a_dead_pid_succeeds() {
        let sup = ProcessSupervisor::new();
        let outcome = sup
            .force_kill(999_999_999, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, KillOutcome { exit_code: None });
    }

    #[tokio::test]
    async fn pid_zero_is_rejected() {
        let sup = ProcessSupervisor::new();
        assert!(!sup.exists(0).await);
        assert!(matches!(
            sup.stop(0, Duration::from_secs(1), StopSignal::Term).await,
            Err(SupervisorError::InvalidPid(0))
        ));
        assert!(matches!(
            sup.force_kill(0, Duration::from_secs(1)).await,
            Err(SupervisorError::InvalidPid(0))
        ));
    }

    #[tokio::test]
    async fn spawn_failure_registers_nothing() {
        let sup = ProcessSupervisor::new();
        let err = sup
            .start(SpawnSpec::new("/frpdesk/no/such/binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
        assert!(sup.list_running().await.is_empty());
    }
}
