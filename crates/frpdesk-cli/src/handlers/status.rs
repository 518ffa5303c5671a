//! `frpdesk status` handler.

use anyhow::Result;

use frpdesk_core::domain::{EntityId, EntityState};

use crate::bootstrap::AppContext;
use crate::error::CliError;
use crate::presentation::{format_optional, format_timestamp, print_separator, truncate_string};

/// Execute the status command.
///
/// Reconciles persisted state against the OS first, so a pid left over
/// from a previous host never shows as running.
///
/// # Errors
///
/// Returns an error if reconciliation or listing fails.
pub async fn execute(ctx: &AppContext) -> Result<()> {
    ctx.reconciler().reconcile().await.map_err(CliError::from)?;

    let tunnels = ctx.tunnels().list().map_err(CliError::from)?;
    let servers = ctx.servers().list().map_err(CliError::from)?;
    if tunnels.is_empty() && servers.is_empty() {
        println!("Nothing defined yet.");
        println!("Use 'frpdesk tunnel add' or 'frpdesk server add' to get started.");
        return Ok(());
    }

    println!(
        "{:<7} {:<4} {:<20} {:<9} {:<7} LAST STARTED",
        "KIND", "ID", "NAME", "STATUS", "PID"
    );
    print_separator(64);
    for tunnel in &tunnels {
        print_row("tunnel", tunnel.id, &tunnel.name, &tunnel.state);
    }
    for server in &servers {
        print_row("server", server.id, &server.name, &server.state);
    }
    Ok(())
}

fn print_row(kind: &str, id: EntityId, name: &str, state: &EntityState) {
    println!(
        "{:<7} {:<4} {:<20} {:<9} {:<7} {}",
        kind,
        id,
        truncate_string(name, 19),
        state.status,
        format_optional(&state.pid, "-"),
        format_timestamp(state.last_started_at, "never"),
    );
    if let Some(message) = &state.error_message {
        println!("{:<13}last error: {message}", "");
    }
}
