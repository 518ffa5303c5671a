//! `frpdesk tunnel` subcommand handlers.
//!
//! Definition management only; starting and stopping live under the
//! top-level `up` and `stop` commands.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use frpdesk_core::domain::{EntityId, TunnelDraft, TunnelPatch};

use crate::bootstrap::AppContext;
use crate::commands::TunnelCommand;
use crate::error::CliError;
use crate::input;
use crate::presentation::{format_optional, format_timestamp, print_separator, truncate_string};

/// Execute a `tunnel` subcommand.
///
/// # Errors
///
/// Returns an error if the orchestrator rejects the operation or if an
/// export/import file cannot be read or written.
pub async fn execute(ctx: &AppContext, command: TunnelCommand) -> Result<()> {
    match command {
        TunnelCommand::Add(args) => add(ctx, args.into_draft()),
        TunnelCommand::List => list(ctx),
        TunnelCommand::Show { id } => show(ctx, id),
        TunnelCommand::Set { id, changes } => set(ctx, id, changes.into_patch()),
        TunnelCommand::Rm { id, force } => rm(ctx, id, force).await,
        TunnelCommand::Config { id } => config(ctx, id),
        TunnelCommand::Export { output } => export(ctx, output),
        TunnelCommand::Import { file } => import(ctx, file),
    }
}

fn add(ctx: &AppContext, draft: TunnelDraft) -> Result<()> {
    let tunnel = ctx.tunnels().add(draft).map_err(CliError::from)?;
    println!("Created tunnel {} ({}).", tunnel.id, tunnel.name);
    println!("Start it with 'frpdesk up --tunnel {}'.", tunnel.id);
    Ok(())
}

fn list(ctx: &AppContext) -> Result<()> {
    let tunnels = ctx.tunnels().list().map_err(CliError::from)?;
    if tunnels.is_empty() {
        println!("No tunnels defined.");
        println!("Use 'frpdesk tunnel add' to create one.");
        return Ok(());
    }

    println!("Found {} tunnel(s):\n", tunnels.len());
    println!(
        "{:<4} {:<20} {:<6} {:<22} {:<22} {:<7} {:<9} PID",
        "ID", "NAME", "PROTO", "LOCAL", "SERVER", "REMOTE", "STATUS"
    );
    print_separator(100);
    for tunnel in tunnels {
        println!(
            "{:<4} {:<20} {:<6} {:<22} {:<22} {:<7} {:<9} {}",
            tunnel.id,
            truncate_string(&tunnel.name, 19),
            tunnel.protocol,
            truncate_string(&tunnel.local_addr, 21),
            truncate_string(&tunnel.server_addr, 21),
            tunnel.remote_port,
            tunnel.state.status,
            format_optional(&tunnel.state.pid, "-"),
        );
    }
    Ok(())
}

fn show(ctx: &AppContext, id: EntityId) -> Result<()> {
    let tunnel = ctx.tunnels().get(id).map_err(CliError::from)?;
    println!("Tunnel {} ({})", tunnel.id, tunnel.name);
    print_separator(48);
    println!("  protocol:     {}", tunnel.protocol);
    println!("  local:        {}", tunnel.local_addr);
    println!("  server:       {}", tunnel.server_addr);
    println!("  remote port:  {}", tunnel.remote_port);
    println!("  auth:         {}", tunnel.auth_mode);
    println!("  status:       {}", tunnel.state.status);
    println!("  pid:          {}", format_optional(&tunnel.state.pid, "-"));
    if let Some(path) = &tunnel.state.config_path {
        println!("  config:       {}", path.display());
    }
    println!(
        "  created:      {}",
        format_timestamp(Some(tunnel.state.created_at), "-")
    );
    println!(
        "  updated:      {}",
        format_timestamp(Some(tunnel.state.updated_at), "-")
    );
    println!(
        "  last started: {}",
        format_timestamp(tunnel.state.last_started_at, "never")
    );
    println!(
        "  last stopped: {}",
        format_timestamp(tunnel.state.last_stopped_at, "never")
    );
    if let Some(message) = &tunnel.state.error_message {
        println!("  last error:   {message}");
    }
    Ok(())
}

fn set(ctx: &AppContext, id: EntityId, patch: TunnelPatch) -> Result<()> {
    let tunnel = ctx.tunnels().update(id, patch).map_err(CliError::from)?;
    println!("Updated tunnel {} ({}).", tunnel.id, tunnel.name);
    if tunnel.state.status.is_active() {
        println!("The tunnel is running; changes take effect on the next start.");
    }
    Ok(())
}

async fn rm(ctx: &AppContext, id: EntityId, force: bool) -> Result<()> {
    let tunnel = ctx.tunnels().get(id).map_err(CliError::from)?;
    if !force {
        let confirmed = input::prompt_confirmation(&format!(
            "Delete tunnel {} ({})?",
            tunnel.id, tunnel.name
        ))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }
    ctx.tunnels().delete(id).await.map_err(CliError::from)?;
    println!("Deleted tunnel {} ({}).", tunnel.id, tunnel.name);
    Ok(())
}

fn config(ctx: &AppContext, id: EntityId) -> Result<()> {
    let rendered = ctx.tunnels().render_config(id).map_err(CliError::from)?;
    // render_config ends with a newline already
    print!("{rendered}");
    Ok(())
}

fn export(ctx: &AppContext, output: Option<PathBuf>) -> Result<()> {
    let drafts = ctx.tunnels().export().map_err(CliError::from)?;
    let json =
        serde_json::to_string_pretty(&drafts).map_err(|e| CliError::Io(e.to_string()))?;
    match output {
        Some(path) => {
            fs::write(&path, &json).map_err(CliError::from)?;
            println!("Exported {} tunnel(s) to {}.", drafts.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn import(ctx: &AppContext, file: PathBuf) -> Result<()> {
    let contents = fs::read_to_string(&file).map_err(CliError::from)?;
    let drafts: Vec<TunnelDraft> = serde_json::from_str(&contents)
        .map_err(|e| CliError::Arguments(format!("invalid import file: {e}")))?;
    let report = ctx.tunnels().import(drafts).map_err(CliError::from)?;
    println!(
        "Imported {} tunnel(s), skipped {} invalid.",
        report.added, report.skipped
    );
    Ok(())
}
