//! Entity lifecycle orchestration.
//!
//! One [`Orchestrator`] per entity kind turns persisted definitions into
//! supervised frp processes: render config, materialize it, spawn
//! `<binary> -c <path>`, track the pid, and keep the persisted record
//! honest when the process stops or dies. A watcher task subscribed to the
//! supervisor bus attributes output lines and reacts to exits the
//! orchestrator did not initiate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::domain::{
    Definition, EntityId, EntityKind, EntityState, EntityStatus, LogBuffer, LogEntry, LogStream,
    ValidationErrors,
};
use crate::events::ProcessEvent;
use crate::ports::{
    ConfigMaterializerPort, DEFAULT_KILL_TIMEOUT, DEFAULT_STOP_TIMEOUT, ProcessSupervisorPort,
    SpawnSpec, StopSignal, StoreError, SupervisorError,
};
use crate::services::entity_store::EntityStore;

/// Orchestration failures surfaced to callers.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No definition with that id.
    #[error("no {kind} with id {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// Start refused because the entity is already running.
    #[error("{kind} {id} is already running")]
    AlreadyRunning { kind: EntityKind, id: EntityId },

    /// Stop refused because the entity is not running.
    #[error("{kind} {id} is not running")]
    AlreadyStopped { kind: EntityKind, id: EntityId },

    /// Delete refused while the entity has a live process.
    #[error("{kind} {id} is running; stop it before deleting")]
    EntityRunning { kind: EntityKind, id: EntityId },

    /// Writing the config file failed; nothing was started.
    #[error("failed to write config for {kind} {id}: {reason}")]
    ConfigWrite {
        kind: EntityKind,
        id: EntityId,
        reason: String,
    },

    /// Draft or patch validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-entity outcome of a [`Orchestrator::stop_all`] sweep.
#[derive(Debug, Clone)]
pub struct StopAllResult {
    pub id: EntityId,
    pub result: Result<(), String>,
}

/// Counts from an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
}

/// Counts from one kind's reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Entities whose records claimed a live process.
    pub checked: usize,
    /// Claims the OS contradicted, corrected to `stopped`.
    pub corrected: usize,
}

/// Drives one entity kind end to end.
///
/// Every collaborator is injected. The orchestrator owns only its pid
/// mapping and per-entity log buffers; cloning shares both, so clones
/// behave as the same instance.
pub struct Orchestrator<D: Definition> {
    store: EntityStore<D>,
    supervisor: Arc<dyn ProcessSupervisorPort>,
    materializer: Arc<dyn ConfigMaterializerPort>,
    binary: PathBuf,
    stop_timeout: Duration,
    kill_timeout: Duration,
    pids: Arc<Mutex<HashMap<EntityId, u32>>>,
    logs: Arc<Mutex<HashMap<EntityId, LogBuffer>>>,
}

impl<D: Definition> Clone for Orchestrator<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            supervisor: Arc::clone(&self.supervisor),
            materializer: Arc::clone(&self.materializer),
            binary: self.binary.clone(),
            stop_timeout: self.stop_timeout,
            kill_timeout: self.kill_timeout,
            pids: Arc::clone(&self.pids),
            logs: Arc::clone(&self.logs),
        }
    }
}

impl<D: Definition> Orchestrator<D> {
    /// Build an orchestrator with the default stop/kill timeouts and start
    /// its event watcher.
    pub fn new(
        store: EntityStore<D>,
        supervisor: Arc<dyn ProcessSupervisorPort>,
        materializer: Arc<dyn ConfigMaterializerPort>,
        binary: PathBuf,
    ) -> Self {
        Self::with_timeouts(
            store,
            supervisor,
            materializer,
            binary,
            DEFAULT_STOP_TIMEOUT,
            DEFAULT_KILL_TIMEOUT,
        )
    }

    pub fn with_timeouts(
        store: EntityStore<D>,
        supervisor: Arc<dyn ProcessSupervisorPort>,
        materializer: Arc<dyn ConfigMaterializerPort>,
        binary: PathBuf,
        stop_timeout: Duration,
        kill_timeout: Duration,
    ) -> Self {
        let pids = Arc::new(Mutex::new(HashMap::new()));
        let logs = Arc::new(Mutex::new(HashMap::new()));
        let watcher = Watcher::<D> {
            store: store.clone(),
            pids: Arc::clone(&pids),
            logs: Arc::clone(&logs),
            materializer: Arc::clone(&materializer),
        };
        // subscribe before anything can start so no event is missed
        let rx = supervisor.subscribe();
        tokio::spawn(watcher.run(rx));
        Self {
            store,
            supervisor,
            materializer,
            binary,
            stop_timeout,
            kill_timeout,
            pids,
            logs,
        }
    }

    pub fn kind(&self) -> EntityKind {
        D::KIND
    }

    // ---- definition CRUD ----

    /// Validate a draft and persist it with the next free id.
    pub fn add(&self, draft: D::Draft) -> Result<D, OrchestratorError> {
        let id = self.store.next_id()?;
        let def = D::from_draft(id, draft, Utc::now())?;
        self.store.insert(def.clone())?;
        info!(kind = %D::KIND, id, name = def.name(), "definition added");
        Ok(def)
    }

    /// Apply a patch. A running entity keeps running with its old config;
    /// the change takes effect on the next start.
    pub fn update(&self, id: EntityId, patch: D::Patch) -> Result<D, OrchestratorError> {
        let current = self.get(id)?;
        let updated = current.apply_patch(patch, Utc::now())?;
        self.store.replace(updated.clone())?;
        debug!(kind = %D::KIND, id, "definition updated");
        Ok(updated)
    }

    /// Remove a definition, its config file, and its log buffer. Refused
    /// while the entity has a live process.
    pub async fn delete(&self, id: EntityId) -> Result<(), OrchestratorError> {
        let def = self.get(id)?;
        if def.state().status.is_active() {
            return Err(OrchestratorError::EntityRunning { kind: D::KIND, id });
        }
        self.store.remove(id)?;
        if let Err(e) = self.materializer.cleanup(D::KIND, id) {
            warn!(kind = %D::KIND, id, error = %e, "config cleanup failed");
        }
        self.logs.lock().await.remove(&id);
        info!(kind = %D::KIND, id, "definition deleted");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<D>, OrchestratorError> {
        Ok(self.store.list()?)
    }

    pub fn get(&self, id: EntityId) -> Result<D, OrchestratorError> {
        self.store
            .find(id)?
            .ok_or(OrchestratorError::NotFound { kind: D::KIND, id })
    }

    /// The config text `start` would materialize, for preview.
    pub fn render_config(&self, id: EntityId) -> Result<String, OrchestratorError> {
        Ok(self.get(id)?.render_config())
    }

    // ---- lifecycle ----

    /// Materialize the config and spawn the entity's process.
    pub async fn start(&self, id: EntityId) -> Result<D, OrchestratorError> {
        let def = self.get(id)?;
        if def.state().status == EntityStatus::Running {
            return Err(OrchestratorError::AlreadyRunning { kind: D::KIND, id });
        }

        let contents = def.render_config();
        let config_path = self
            .materializer
            .materialize(D::KIND, id, &contents)
            .map_err(|e| OrchestratorError::ConfigWrite {
                kind: D::KIND,
                id,
                reason: e.to_string(),
            })?;

        let spec = SpawnSpec::new(self.binary.clone())
            .arg("-c")
            .arg(config_path.display().to_string());
        let summary = match self.supervisor.start(spec).await {
            Ok(summary) => summary,
            Err(err) => {
                // leave the definition stopped and the config on disk for
                // inspection; record the failure where logs are read
                self.logs
                    .lock()
                    .await
                    .entry(id)
                    .or_default()
                    .push(LogEntry::new(
                        LogStream::Stderr,
                        format!("start failed: {err}"),
                    ));
                warn!(kind = %D::KIND, id, error = %err, "spawn failed");
                return Err(err.into());
            }
        };

        self.pids.lock().await.insert(id, summary.pid);
        let updated = self
            .store
            .update_with(id, |d| {
                d.state_mut()
                    .mark_running(summary.pid, config_path.clone(), Utc::now());
            })?
            .ok_or(OrchestratorError::NotFound { kind: D::KIND, id })?;
        info!(kind = %D::KIND, id, pid = summary.pid, "started");
        Ok(updated)
    }

    /// Stop the entity's process and persist `stopped`.
    ///
    /// The pid comes from the live mapping when there is one, falling back
    /// to the persisted record so a stop still works after the host that
    /// started the process is gone.
    pub async fn stop(&self, id: EntityId) -> Result<(), OrchestratorError> {
        let def = self.get(id)?;
        if !def.state().status.is_active() {
            return Err(OrchestratorError::AlreadyStopped { kind: D::KIND, id });
        }

        let mapped = self.pids.lock().await.get(&id).copied();
        let Some(pid) = mapped.or(def.state().pid) else {
            // active status with no pid anywhere: a start never finished.
            // correct the record rather than leaving it claiming a process.
            self.store
                .update_with(id, |d| d.state_mut().mark_stopped(Utc::now()))?;
            return Err(OrchestratorError::AlreadyStopped { kind: D::KIND, id });
        };

        self.store
            .update_with(id, |d| d.state_mut().mark_stopping(Utc::now()))?;

        match self
            .supervisor
            .stop(pid, self.stop_timeout, StopSignal::Term)
            .await
        {
            Ok(outcome) => {
                debug!(kind = %D::KIND, id, pid, ?outcome, "process stopped");
            }
            Err(SupervisorError::NotFound(_)) => {
                debug!(kind = %D::KIND, id, pid, "process already gone");
            }
            Err(err) => {
                warn!(kind = %D::KIND, id, pid, error = %err, "graceful stop failed, force-killing");
                match self.supervisor.force_kill(pid, self.kill_timeout).await {
                    Ok(_) | Err(SupervisorError::NotFound(_)) => {}
                    Err(kill_err) => {
                        // the process is demonstrably alive; put the record
                        // back to the truthful state before surfacing
                        self.store.update_with(id, |d| {
                            d.state_mut().status = EntityStatus::Running;
                            d.state_mut().touch(Utc::now());
                        })?;
                        return Err(kill_err.into());
                    }
                }
            }
        }

        self.finish_stop(id).await?;
        Ok(())
    }

    async fn finish_stop(&self, id: EntityId) -> Result<(), OrchestratorError> {
        self.store
            .update_with(id, |d| d.state_mut().mark_stopped(Utc::now()))?;
        if let Err(e) = self.materializer.cleanup(D::KIND, id) {
            warn!(kind = %D::KIND, id, error = %e, "config cleanup failed");
        }
        self.logs.lock().await.remove(&id);
        self.pids.lock().await.remove(&id);
        info!(kind = %D::KIND, id, "stopped");
        Ok(())
    }

    /// Stop (tolerating an already-stopped entity) and start again.
    pub async fn restart(&self, id: EntityId) -> Result<D, OrchestratorError> {
        match self.stop(id).await {
            Ok(()) | Err(OrchestratorError::AlreadyStopped { .. }) => {}
            Err(err) => return Err(err),
        }
        self.start(id).await
    }

    /// Stop every entity with an active status, concurrently. One entity's
    /// failure never aborts the others; each gets its own result.
    pub async fn stop_all(&self) -> Result<Vec<StopAllResult>, OrchestratorError> {
        let ids: Vec<EntityId> = self
            .list()?
            .into_iter()
            .filter(|d| d.state().status.is_active())
            .map(|d| d.id())
            .collect();

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids {
            let this = self.clone();
            tasks.spawn(async move {
                let result = this.stop(id).await.map_err(|e| e.to_string());
                StopAllResult { id, result }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(kind = %D::KIND, error = %e, "stop task panicked"),
            }
        }
        results.sort_by_key(|r| r.id);
        Ok(results)
    }

    // ---- observation ----

    /// Persisted lifecycle view: status, pid, timestamps, last error.
    pub fn status_of(&self, id: EntityId) -> Result<EntityState, OrchestratorError> {
        Ok(self.get(id)?.state().clone())
    }

    /// Captured output for the entity, oldest first.
    pub async fn logs_of(&self, id: EntityId) -> Result<Vec<LogEntry>, OrchestratorError> {
        self.get(id)?;
        Ok(self
            .logs
            .lock()
            .await
            .get(&id)
            .map(LogBuffer::to_vec)
            .unwrap_or_default())
    }

    pub async fn clear_logs(&self, id: EntityId) -> Result<(), OrchestratorError> {
        self.get(id)?;
        if let Some(buffer) = self.logs.lock().await.get_mut(&id) {
            buffer.clear();
        }
        Ok(())
    }

    /// True only when the record claims `running` and the OS confirms the
    /// recorded pid.
    pub async fn is_running(&self, id: EntityId) -> Result<bool, OrchestratorError> {
        let def = self.get(id)?;
        if def.state().status != EntityStatus::Running {
            return Ok(false);
        }
        let Some(pid) = def.state().pid else {
            return Ok(false);
        };
        Ok(self.supervisor.exists(pid).await)
    }

    /// Correct stale `running`/`stopping` claims left by a dead host.
    pub async fn reconcile(&self) -> Result<ReconcileStats, OrchestratorError> {
        let mut stats = ReconcileStats::default();
        for def in self.list()? {
            if !def.state().status.is_active() {
                continue;
            }
            stats.checked += 1;
            let alive = match def.state().pid {
                Some(pid) => self.supervisor.exists(pid).await,
                None => false,
            };
            if alive {
                continue;
            }
            self.store
                .update_with(def.id(), |d| d.state_mut().mark_stopped(Utc::now()))?;
            stats.corrected += 1;
            info!(kind = %D::KIND, id = def.id(), "corrected stale status to stopped");
        }
        Ok(stats)
    }

    // ---- export / import ----

    /// Definitions as drafts, ready to re-import elsewhere.
    pub fn export(&self) -> Result<Vec<D::Draft>, OrchestratorError> {
        Ok(self.list()?.iter().map(Definition::to_draft).collect())
    }

    /// Add each draft with a fresh id. Invalid drafts are skipped and
    /// counted; store failures abort.
    pub fn import(&self, drafts: Vec<D::Draft>) -> Result<ImportReport, OrchestratorError> {
        let mut report = ImportReport::default();
        for draft in drafts {
            match self.add(draft) {
                Ok(_) => report.added += 1,
                Err(OrchestratorError::Validation(errors)) => {
                    warn!(kind = %D::KIND, error = %errors, "skipping invalid import entry");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }
}

/// Subscriber to the supervisor bus. Attributes output lines to entities
/// and reacts to deaths the orchestrator did not initiate.
struct Watcher<D: Definition> {
    store: EntityStore<D>,
    pids: Arc<Mutex<HashMap<EntityId, u32>>>,
    logs: Arc<Mutex<HashMap<EntityId, LogBuffer>>>,
    materializer: Arc<dyn ConfigMaterializerPort>,
}

impl<D: Definition> Watcher<D> {
    async fn run(self, mut rx: broadcast::Receiver<ProcessEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(kind = %D::KIND, skipped, "event bus lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!(kind = %D::KIND, "event watcher stopped");
    }

    async fn handle(&self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output { pid, entry } => {
                let Some(id) = self.entity_for(pid).await else {
                    return;
                };
                self.logs.lock().await.entry(id).or_default().push(entry);
            }
            ProcessEvent::Exited { pid, info } => {
                self.handle_exit(pid, info.is_clean(), info.describe()).await;
            }
            ProcessEvent::Error { pid, message } => {
                self.handle_exit(pid, false, message).await;
            }
            ProcessEvent::Started { .. } | ProcessEvent::Stopping { .. } => {}
        }
    }

    async fn entity_for(&self, pid: u32) -> Option<EntityId> {
        self.pids
            .lock()
            .await
            .iter()
            .find_map(|(id, p)| (*p == pid).then_some(*id))
    }

    /// Exits observed while an explicit stop is in flight (persisted
    /// status `stopping`) belong to that stop, which owns the cleanup.
    /// Everything else is an unexpected death.
    async fn handle_exit(&self, pid: u32, clean: bool, detail: String) {
        let Some(id) = self.entity_for(pid).await else {
            return;
        };
        self.pids.lock().await.remove(&id);

        let current = match self.store.find(id) {
            Ok(Some(def)) => def,
            Ok(None) => return,
            Err(e) => {
                warn!(kind = %D::KIND, id, error = %e, "store read failed during exit handling");
                return;
            }
        };
        if current.state().status != EntityStatus::Running {
            debug!(kind = %D::KIND, id, pid, "exit observed during explicit stop");
            return;
        }

        let now = Utc::now();
        let update = self.store.update_with(id, |d| {
            if clean {
                d.state_mut().mark_stopped(now);
            } else {
                d.state_mut().mark_error(detail.clone(), now);
            }
        });
        if let Err(e) = update {
            warn!(kind = %D::KIND, id, error = %e, "failed to persist exit");
        }
        if let Err(e) = self.materializer.cleanup(D::KIND, id) {
            warn!(kind = %D::KIND, id, error = %e, "config cleanup failed");
        }
        self.logs.lock().await.remove(&id);
        if clean {
            info!(kind = %D::KIND, id, pid, "process exited cleanly");
        } else {
            warn!(kind = %D::KIND, id, pid, detail, "process died unexpectedly");
        }
    }
}
