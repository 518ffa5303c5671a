//! Core domain and orchestration for frpdesk, a manager for frp tunnels
//! and servers.
//!
//! This crate is I/O-free: domain types, port traits, and the services
//! that coordinate them. Adapters (the JSON store, the process
//! supervisor, the config writer) live in sibling crates and are injected
//! at composition time, so every service here is testable with in-memory
//! fakes.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types for convenience
pub use domain::{
    AuthMode, Definition, Endpoint, EndpointParseError, EntityId, EntityKind, EntityState,
    EntityStatus, FieldError, LogBuffer, LogEntry, LogStream, Protocol, ServerDefinition,
    ServerDraft, ServerPatch, TunnelDefinition, TunnelDraft, TunnelPatch, ValidationErrors,
};
pub use events::{ExitInfo, ProcessEvent};
pub use ports::{
    ConfigMaterializerPort, DEFAULT_KILL_TIMEOUT, DEFAULT_STOP_TIMEOUT, KillOutcome, KvStore,
    ProcessStatus, ProcessSummary, ProcessSupervisorPort, SpawnSpec, StopOutcome, StopSignal,
    StoreError, SupervisorError,
};
pub use services::{
    EntityStore, ImportReport, Orchestrator, OrchestratorError, ReconcileReport, ReconcileStats,
    Reconciler, ShutdownReport, StopAllResult,
};

// Re-export path utilities
pub use paths::{HOME_ENV, PathError, configs_dir, data_root, store_path};
