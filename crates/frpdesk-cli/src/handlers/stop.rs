//! `frpdesk stop` handler.

use anyhow::Result;

use frpdesk_core::domain::EntityId;
use frpdesk_core::services::{OrchestratorError, StopAllResult};

use crate::bootstrap::AppContext;
use crate::commands::Selection;
use crate::error::CliError;

/// Execute the stop command.
///
/// `--all` delegates to the reconciler so tunnels stop before the
/// servers they connect to. Explicit ids stop in the order given; one
/// failure does not abort the rest.
///
/// # Errors
///
/// Returns an error if the selection is empty or any stop failed.
pub async fn execute(ctx: &AppContext, selection: Selection) -> Result<()> {
    if selection.is_empty() {
        return Err(CliError::Arguments(
            "nothing to stop; pass --tunnel <id>, --server <id>, or --all".to_string(),
        )
        .into());
    }

    if selection.all {
        return stop_everything(ctx).await;
    }

    let mut failures = 0usize;
    for id in selection.tunnels.iter().copied() {
        report_stop("tunnel", id, ctx.tunnels().stop(id).await, &mut failures);
    }
    for id in selection.servers.iter().copied() {
        report_stop("server", id, ctx.servers().stop(id).await, &mut failures);
    }
    if failures > 0 {
        return Err(CliError::Process(format!("{failures} stop(s) failed")).into());
    }
    Ok(())
}

async fn stop_everything(ctx: &AppContext) -> Result<()> {
    let report = ctx.reconciler().shutdown().await;
    if report.tunnels.is_empty() && report.servers.is_empty() {
        println!("Nothing was running.");
        return Ok(());
    }

    for result in &report.tunnels {
        print_sweep_entry("tunnel", result);
    }
    for result in &report.servers {
        print_sweep_entry("server", result);
    }
    println!("Stopped {} process(es).", report.stopped());

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::Process(format!(
            "{} process(es) failed to stop",
            report.failures().len()
        ))
        .into())
    }
}

fn report_stop(
    kind: &str,
    id: EntityId,
    result: Result<(), OrchestratorError>,
    failures: &mut usize,
) {
    match result {
        Ok(()) => println!("Stopped {kind} {id}."),
        Err(OrchestratorError::AlreadyStopped { .. }) => {
            println!("{kind} {id} is not running.");
        }
        Err(err) => {
            eprintln!("Failed to stop {kind} {id}: {err}");
            *failures += 1;
        }
    }
}

fn print_sweep_entry(kind: &str, result: &StopAllResult) {
    match &result.result {
        Ok(()) => println!("Stopped {kind} {}.", result.id),
        Err(reason) => eprintln!("Failed to stop {kind} {}: {reason}", result.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{CliConfig, compose};
    use frpdesk_core::domain::{AuthMode, Protocol, TunnelDraft};
    use frpdesk_runtime::{ConfigDir, ProcessSupervisor};
    use frpdesk_store::MemoryStore;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn context(dir: &std::path::Path) -> AppContext {
        let config = CliConfig {
            data_dir: dir.to_path_buf(),
            frpc_bin: PathBuf::from("frpc"),
            frps_bin: PathBuf::from("frps"),
        };
        compose(
            Arc::new(MemoryStore::new()),
            Arc::new(ProcessSupervisor::new()),
            Arc::new(ConfigDir::new(dir.join("configs"))),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_selection_is_a_usage_error() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());

        let err = execute(&ctx, Selection::default()).await.unwrap_err();
        let cli = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli.exit_code(), 2);
    }

    #[tokio::test]
    async fn stopping_a_stopped_tunnel_is_tolerated() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let id = ctx
            .tunnels()
            .add(TunnelDraft {
                name: "web".to_string(),
                protocol: Protocol::Tcp,
                local_addr: "127.0.0.1:8080".to_string(),
                server_addr: "frps.example.com:7000".to_string(),
                remote_port: 9100,
                auth_mode: AuthMode::None,
                auth_token: None,
            })
            .unwrap()
            .id;

        execute(
            &ctx,
            Selection {
                tunnels: vec![id],
                servers: Vec::new(),
                all: false,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stop_all_with_nothing_running_is_a_no_op() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());

        execute(
            &ctx,
            Selection {
                tunnels: Vec::new(),
                servers: Vec::new(),
                all: true,
            },
        )
        .await
        .unwrap();
    }
}
