//! `frpdesk up` handler: start entities and stream their output.
//!
//! The session subscribes to the supervisor bus before anything starts,
//! so no early output or a fast exit is missed. It then runs until every
//! started process has exited or a shutdown signal arrives, and stops
//! whatever it started on the way out.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::warn;

use frpdesk_core::domain::EntityId;
use frpdesk_core::events::ProcessEvent;
use frpdesk_core::services::OrchestratorError;

use crate::bootstrap::AppContext;
use crate::commands::Selection;
use crate::error::CliError;

/// Execute the up command.
///
/// # Errors
///
/// Returns an error if the selection is empty, if nothing could be
/// started, or if a started process refused to stop on the way out.
pub async fn execute(ctx: &AppContext, selection: Selection) -> Result<()> {
    if selection.is_empty() {
        return Err(CliError::Arguments(
            "nothing to start; pass --tunnel <id>, --server <id>, or --all".to_string(),
        )
        .into());
    }

    // Clear stale claims first so starts do not trip over records that
    // still name a pid from a previous host.
    ctx.reconciler().reconcile().await.map_err(CliError::from)?;

    let (tunnel_ids, server_ids) = resolve(ctx, &selection)?;
    if tunnel_ids.is_empty() && server_ids.is_empty() {
        println!("Nothing to start.");
        return Ok(());
    }

    let mut rx = ctx.supervisor().subscribe();

    // Servers come up before the tunnels that may connect to them.
    let mut labels: HashMap<u32, String> = HashMap::new();
    let mut started_servers = Vec::new();
    let mut started_tunnels = Vec::new();
    let mut failed = 0usize;
    for id in server_ids {
        match ctx.servers().start(id).await {
            Ok(server) => {
                let pid = server.state.pid.unwrap_or_default();
                println!("Started server {} ({}), pid {pid}.", server.id, server.name);
                labels.insert(pid, format!("server:{}", server.name));
                started_servers.push(id);
            }
            Err(err) => {
                eprintln!("Failed to start server {id}: {err}");
                failed += 1;
            }
        }
    }
    for id in tunnel_ids {
        match ctx.tunnels().start(id).await {
            Ok(tunnel) => {
                let pid = tunnel.state.pid.unwrap_or_default();
                println!("Started tunnel {} ({}), pid {pid}.", tunnel.id, tunnel.name);
                labels.insert(pid, format!("tunnel:{}", tunnel.name));
                started_tunnels.push(id);
            }
            Err(err) => {
                eprintln!("Failed to start tunnel {id}: {err}");
                failed += 1;
            }
        }
    }

    if labels.is_empty() {
        return Err(CliError::Process("nothing started".to_string()).into());
    }
    if failed > 0 {
        eprintln!("{failed} start(s) failed; continuing with the rest.");
    }
    println!("Streaming output; press Ctrl-C to stop everything.");

    stream_events(&mut rx, &mut labels).await;

    // Stop what this session started, tunnels before servers. Anything
    // that already exited settles as a quiet no-op.
    let mut stop_failures = 0usize;
    for id in started_tunnels {
        finish("tunnel", id, ctx.tunnels().stop(id).await, &mut stop_failures);
    }
    for id in started_servers {
        finish("server", id, ctx.servers().stop(id).await, &mut stop_failures);
    }
    if stop_failures > 0 {
        return Err(
            CliError::Process(format!("{stop_failures} process(es) failed to stop")).into(),
        );
    }
    Ok(())
}

/// Selection as concrete id lists; `--all` expands to every definition.
fn resolve(
    ctx: &AppContext,
    selection: &Selection,
) -> Result<(Vec<EntityId>, Vec<EntityId>), CliError> {
    if selection.all {
        let tunnels = ctx.tunnels().list()?.into_iter().map(|t| t.id).collect();
        let servers = ctx.servers().list()?.into_iter().map(|s| s.id).collect();
        Ok((tunnels, servers))
    } else {
        Ok((selection.tunnels.clone(), selection.servers.clone()))
    }
}

/// Render events until a shutdown signal arrives or every tracked pid
/// has exited.
async fn stream_events(
    rx: &mut broadcast::Receiver<ProcessEvent>,
    labels: &mut HashMap<u32, String>,
) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                println!();
                println!("Shutting down.");
                break;
            }
            event = rx.recv() => match event {
                Ok(ProcessEvent::Output { pid, entry }) => {
                    if let Some(label) = labels.get(&pid) {
                        println!("[{label}] {}", entry.text);
                    }
                }
                Ok(ProcessEvent::Exited { pid, info }) => {
                    if let Some(label) = labels.remove(&pid) {
                        println!("[{label}] {}.", info.describe());
                        if labels.is_empty() {
                            println!("All processes exited.");
                            break;
                        }
                    }
                }
                Ok(ProcessEvent::Error { pid, message }) => {
                    if let Some(label) = labels.remove(&pid) {
                        eprintln!("[{label}] error: {message}");
                        if labels.is_empty() {
                            break;
                        }
                    }
                }
                Ok(ProcessEvent::Started { .. } | ProcessEvent::Stopping { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, some output was dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn finish(
    kind: &str,
    id: EntityId,
    result: Result<(), OrchestratorError>,
    failures: &mut usize,
) {
    match result {
        Ok(()) => println!("Stopped {kind} {id}."),
        Err(OrchestratorError::AlreadyStopped { .. }) => {}
        Err(err) => {
            eprintln!("Failed to stop {kind} {id}: {err}");
            *failures += 1;
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut term) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
