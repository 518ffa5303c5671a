//! OS-facing adapters for frpdesk.
//!
//! Everything here implements a port from `frpdesk-core`: the process
//! supervisor that drives the frp binaries, and the config directory that
//! materializes rendered TOML for them. Nothing above this crate touches
//! the OS directly.

pub mod materializer;
pub mod supervisor;

// Re-export the adapters composition roots wire up
pub use materializer::ConfigDir;
pub use supervisor::ProcessSupervisor;
