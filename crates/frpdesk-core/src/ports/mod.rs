//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define what the orchestration layer expects from infrastructure:
//! persistence, process supervision, config materialization. They use only
//! domain types, so adapters can be swapped (or faked in tests) without
//! touching the services.
//!
//! # Design Rules
//!
//! - No adapter types in any signature
//! - Intent-based methods for the supervisor (not implementation-leaking)
//! - Every collaborator is injected; nothing here is a singleton

pub mod kv_store;
pub mod materializer;
pub mod supervisor;

// Re-export port traits and their companion types for convenience
pub use kv_store::{KvStore, StoreError};
pub use materializer::ConfigMaterializerPort;
pub use supervisor::{
    DEFAULT_KILL_TIMEOUT, DEFAULT_STOP_TIMEOUT, KillOutcome, ProcessStatus, ProcessSummary,
    ProcessSupervisorPort, SpawnSpec, StopOutcome, StopSignal, SupervisorError,
};
