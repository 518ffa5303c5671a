//! Core services - the application's business logic layer.
//!
//! Services orchestrate between ports (trait interfaces) and domain logic.
//! They are pure coordinators: all I/O goes through injected port
//! implementations, so everything here is testable with fakes.

mod entity_store;
mod orchestrator;
mod reconciler;

pub use entity_store::EntityStore;
pub use orchestrator::{
    ImportReport, Orchestrator, OrchestratorError, ReconcileStats, StopAllResult,
};
pub use reconciler::{ReconcileReport, Reconciler, ShutdownReport};
