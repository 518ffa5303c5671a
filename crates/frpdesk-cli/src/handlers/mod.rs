//! Command handlers that delegate to the core orchestrators.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &AppContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call orchestrator or reconciler methods
//!   3. Format output for the terminal
//!
//! Handlers should NOT:
//! - Touch the store or the supervisor directly
//! - Contain lifecycle logic of their own

pub mod reconcile;
pub mod server;
pub mod status;
pub mod stop;
pub mod tunnel;
pub mod up;
