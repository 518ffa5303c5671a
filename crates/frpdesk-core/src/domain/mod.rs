//! Core domain types.
//!
//! Pure data, no I/O: definitions and their drafts/patches, lifecycle
//! state, endpoint parsing, validation, and bounded log capture. Config
//! rendering lives on the definitions themselves so it can be previewed
//! and tested directly.

pub mod endpoint;
pub mod entity;
pub mod logs;
pub mod server;
pub mod state;
pub mod tunnel;
pub mod validation;

// Re-export domain types at the crate level for convenience
pub use endpoint::{Endpoint, EndpointParseError, Protocol};
pub use entity::{AuthMode, Definition, EntityId, EntityKind};
pub use logs::{LogBuffer, LogEntry, LogStream};
pub use server::{ServerDefinition, ServerDraft, ServerPatch};
pub use state::{EntityState, EntityStatus};
pub use tunnel::{TunnelDefinition, TunnelDraft, TunnelPatch};
pub use validation::{FieldError, ValidationErrors};
