//! Persisted lifecycle state shared by tunnel and server records.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a managed entity as persisted in the store.
///
/// `Running` implies a recorded pid, but the pid may be stale after a host
/// restart; reconciliation corrects such claims against the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Stopped,
    Running,
    Stopping,
    Error,
}

impl EntityStatus {
    /// Whether a live process is (claimed to be) attached.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book-keeping fields flattened into every persisted definition.
///
/// Transitions go through the `mark_*` methods so each state change keeps
/// the dependent fields (pid, config path, timestamps, error message)
/// consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stopped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EntityState {
    /// Fresh state for a newly created definition.
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: EntityStatus::Stopped,
            pid: None,
            config_path: None,
            created_at: now,
            updated_at: now,
            last_started_at: None,
            last_stopped_at: None,
            error_message: None,
        }
    }

    /// Record a successful start. Clears any error left by a previous crash.
    pub fn mark_running(&mut self, pid: u32, config_path: PathBuf, now: DateTime<Utc>) {
        self.status = EntityStatus::Running;
        self.pid = Some(pid);
        self.config_path = Some(config_path);
        self.last_started_at = Some(now);
        self.error_message = None;
        self.updated_at = now;
    }

    /// Record that a stop is in flight.
    pub fn mark_stopping(&mut self, now: DateTime<Utc>) {
        self.status = EntityStatus::Stopping;
        self.updated_at = now;
    }

    /// Record a completed stop. Clears the pid and config path.
    pub fn mark_stopped(&mut self, now: DateTime<Utc>) {
        self.status = EntityStatus::Stopped;
        self.pid = None;
        self.config_path = None;
        self.last_stopped_at = Some(now);
        self.updated_at = now;
    }

    /// Record an unexpected death. The message stays visible in status
    /// output until the next successful start.
    pub fn mark_error(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.status = EntityStatus::Error;
        self.pid = None;
        self.config_path = None;
        self.last_stopped_at = Some(now);
        self.error_message = Some(message.into());
        self.updated_at = now;
    }

    /// Bump `updated_at` without a status change (definition edits).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
