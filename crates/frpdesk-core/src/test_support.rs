//! Hand-rolled fakes shared by the service tests.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{AuthMode, EntityId, EntityKind, LogEntry, LogStream, Protocol};
use crate::domain::{ServerDraft, TunnelDraft};
use crate::events::{ExitInfo, ProcessEvent};
use crate::ports::{
    ConfigMaterializerPort, KillOutcome, KvStore, ProcessStatus, ProcessSummary,
    ProcessSupervisorPort, SpawnSpec, StopOutcome, StopSignal, StoreError, SupervisorError,
};

/// In-memory [`KvStore`] over a plain JSON map.
#[derive(Default)]
pub struct MemKv {
    map: Mutex<serde_json::Map<String, Value>>,
}

impl KvStore for MemKv {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.map.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.map.lock().unwrap().remove(key).is_some())
    }

    fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.map.lock().unwrap().contains_key(key))
    }
}

/// Records materialize/cleanup calls without touching the filesystem.
#[derive(Default)]
pub struct FakeMaterializer {
    pub written: Mutex<Vec<(EntityKind, EntityId)>>,
    pub cleaned: Mutex<Vec<(EntityKind, EntityId)>>,
    pub fail_write: Mutex<bool>,
}

impl ConfigMaterializerPort for FakeMaterializer {
    fn materialize(&self, kind: EntityKind, id: EntityId, _contents: &str) -> io::Result<PathBuf> {
        if *self.fail_write.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        self.written.lock().unwrap().push((kind, id));
        Ok(self.path_for(kind, id))
    }

    fn cleanup(&self, kind: EntityKind, id: EntityId) -> io::Result<()> {
        self.cleaned.lock().unwrap().push((kind, id));
        Ok(())
    }

    fn path_for(&self, kind: EntityKind, id: EntityId) -> PathBuf {
        PathBuf::from(format!("/fake/{}-{id}.toml", kind.config_stem()))
    }
}

/// Scriptable supervisor: hands out pids, tracks liveness, and lets tests
/// fail specific stops/kills or simulate deaths.
pub struct FakeSupervisor {
    pub tx: broadcast::Sender<ProcessEvent>,
    next_pid: AtomicU32,
    pub alive: Mutex<HashSet<u32>>,
    pub fail_spawn: Mutex<bool>,
    pub fail_stop_pids: Mutex<HashSet<u32>>,
    pub fail_kill_pids: Mutex<HashSet<u32>>,
    pub stops: Mutex<Vec<u32>>,
    pub kills: Mutex<Vec<u32>>,
}

impl Default for FakeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSupervisor {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            next_pid: AtomicU32::new(1000),
            alive: Mutex::default(),
            fail_spawn: Mutex::new(false),
            fail_stop_pids: Mutex::default(),
            fail_kill_pids: Mutex::default(),
            stops: Mutex::default(),
            kills: Mutex::default(),
        }
    }

    /// Simulate a death the supervisor noticed: emits the exit event.
    pub fn die(&self, pid: u32, code: Option<i32>) {
        self.alive.lock().unwrap().remove(&pid);
        let _ = self.tx.send(ProcessEvent::Exited {
            pid,
            info: ExitInfo {
                code,
                forced: false,
            },
        });
    }

    /// Simulate a process gone without any event, as after a host restart.
    pub fn vanish(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn emit_output(&self, pid: u32, text: &str) {
        let _ = self.tx.send(ProcessEvent::Output {
            pid,
            entry: LogEntry::new(LogStream::Stdout, text),
        });
    }
}

#[async_trait]
impl ProcessSupervisorPort for FakeSupervisor {
    async fn start(&self, spec: SpawnSpec) -> Result<ProcessSummary, SupervisorError> {
        if *self.fail_spawn.lock().unwrap() {
            return Err(SupervisorError::Spawn {
                command: spec.command.display().to_string(),
                reason: "no such binary".to_string(),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        Ok(ProcessSummary {
            pid,
            command: spec.command,
            args: spec.args,
            status: ProcessStatus::Running,
            started_at: Utc::now(),
            exit_code: None,
            last_error: None,
        })
    }

    async fn stop(
        &self,
        pid: u32,
        _timeout: Duration,
        _signal: StopSignal,
    ) -> Result<StopOutcome, SupervisorError> {
        self.stops.lock().unwrap().push(pid);
        if self.fail_stop_pids.lock().unwrap().contains(&pid) {
            return Err(SupervisorError::Signal {
                pid,
                reason: "refused".to_string(),
            });
        }
        if !self.alive.lock().unwrap().contains(&pid) {
            return Err(SupervisorError::NotFound(pid));
        }
        self.die(pid, Some(0));
        Ok(StopOutcome::Exited { code: Some(0) })
    }

    async fn force_kill(&self, pid: u32, _timeout: Duration) -> Result<KillOutcome, SupervisorError> {
        self.kills.lock().unwrap().push(pid);
        if self.fail_kill_pids.lock().unwrap().contains(&pid) {
            return Err(SupervisorError::ForceKillFailed {
                pid,
                reason: "still alive".to_string(),
            });
        }
        self.alive.lock().unwrap().remove(&pid);
        let _ = self.tx.send(ProcessEvent::Exited {
            pid,
            info: ExitInfo {
                code: None,
                forced: true,
            },
        });
        Ok(KillOutcome { exit_code: None })
    }

    async fn exists(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    async fn list_running(&self) -> Vec<ProcessSummary> {
        Vec::new()
    }

    fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.tx.subscribe()
    }
}

pub fn tunnel_draft(name: &str) -> TunnelDraft {
    TunnelDraft {
        name: name.to_string(),
        protocol: Protocol::Tcp,
        local_addr: "127.0.0.1:8080".to_string(),
        server_addr: "example.com:7000".to_string(),
        remote_port: 9000,
        auth_mode: AuthMode::None,
        auth_token: None,
    }
}

pub fn server_draft(name: &str) -> ServerDraft {
    ServerDraft {
        name: name.to_string(),
        bind_port: 7000,
        auth_mode: AuthMode::None,
        auth_token: None,
    }
}

/// Poll `check` until it passes or two seconds elapse.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
