//! `frpdesk reconcile` handler.

use anyhow::Result;

use crate::bootstrap::AppContext;
use crate::error::CliError;

/// Execute the reconcile command and print what was corrected.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub async fn execute(ctx: &AppContext) -> Result<()> {
    let report = ctx.reconciler().reconcile().await.map_err(CliError::from)?;
    println!(
        "Tunnels: checked {}, corrected {}.",
        report.tunnels.checked, report.tunnels.corrected
    );
    println!(
        "Servers: checked {}, corrected {}.",
        report.servers.checked, report.servers.corrected
    );
    if report.corrected() == 0 {
        println!("Persisted state agrees with the OS.");
    }
    Ok(())
}
