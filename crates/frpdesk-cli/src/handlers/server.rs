//! `frpdesk server` subcommand handlers.

use anyhow::Result;

use frpdesk_core::domain::{EntityId, ServerDraft, ServerPatch};

use crate::bootstrap::AppContext;
use crate::commands::ServerCommand;
use crate::error::CliError;
use crate::input;
use crate::presentation::{format_optional, format_timestamp, print_separator, truncate_string};

/// Execute a `server` subcommand.
///
/// # Errors
///
/// Returns an error if the orchestrator rejects the operation.
pub async fn execute(ctx: &AppContext, command: ServerCommand) -> Result<()> {
    match command {
        ServerCommand::Add(args) => add(ctx, args.into_draft()),
        ServerCommand::List => list(ctx),
        ServerCommand::Show { id } => show(ctx, id),
        ServerCommand::Set { id, changes } => set(ctx, id, changes.into_patch()),
        ServerCommand::Rm { id, force } => rm(ctx, id, force).await,
        ServerCommand::Config { id } => config(ctx, id),
    }
}

fn add(ctx: &AppContext, draft: ServerDraft) -> Result<()> {
    let server = ctx.servers().add(draft).map_err(CliError::from)?;
    println!("Created server {} ({}).", server.id, server.name);
    println!("Start it with 'frpdesk up --server {}'.", server.id);
    Ok(())
}

fn list(ctx: &AppContext) -> Result<()> {
    let servers = ctx.servers().list().map_err(CliError::from)?;
    if servers.is_empty() {
        println!("No servers defined.");
        println!("Use 'frpdesk server add' to create one.");
        return Ok(());
    }

    println!("Found {} server(s):\n", servers.len());
    println!(
        "{:<4} {:<20} {:<10} {:<7} {:<9} PID",
        "ID", "NAME", "BIND PORT", "AUTH", "STATUS"
    );
    print_separator(60);
    for server in servers {
        println!(
            "{:<4} {:<20} {:<10} {:<7} {:<9} {}",
            server.id,
            truncate_string(&server.name, 19),
            server.bind_port,
            server.auth_mode,
            server.state.status,
            format_optional(&server.state.pid, "-"),
        );
    }
    Ok(())
}

fn show(ctx: &AppContext, id: EntityId) -> Result<()> {
    let server = ctx.servers().get(id).map_err(CliError::from)?;
    println!("Server {} ({})", server.id, server.name);
    print_separator(48);
    println!("  bind port:    {}", server.bind_port);
    println!("  auth:         {}", server.auth_mode);
    println!("  status:       {}", server.state.status);
    println!("  pid:          {}", format_optional(&server.state.pid, "-"));
    if let Some(path) = &server.state.config_path {
        println!("  config:       {}", path.display());
    }
    println!(
        "  created:      {}",
        format_timestamp(Some(server.state.created_at), "-")
    );
    println!(
        "  updated:      {}",
        format_timestamp(Some(server.state.updated_at), "-")
    );
    println!(
        "  last started: {}",
        format_timestamp(server.state.last_started_at, "never")
    );
    println!(
        "  last stopped: {}",
        format_timestamp(server.state.last_stopped_at, "never")
    );
    if let Some(message) = &server.state.error_message {
        println!("  last error:   {message}");
    }
    Ok(())
}

fn set(ctx: &AppContext, id: EntityId, patch: ServerPatch) -> Result<()> {
    let server = ctx.servers().update(id, patch).map_err(CliError::from)?;
    println!("Updated server {} ({}).", server.id, server.name);
    if server.state.status.is_active() {
        println!("The server is running; changes take effect on the next start.");
    }
    Ok(())
}

async fn rm(ctx: &AppContext, id: EntityId, force: bool) -> Result<()> {
    let server = ctx.servers().get(id).map_err(CliError::from)?;
    if !force {
        let confirmed = input::prompt_confirmation(&format!(
            "Delete server {} ({})?",
            server.id, server.name
        ))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }
    ctx.servers().delete(id).await.map_err(CliError::from)?;
    println!("Deleted server {} ({}).", server.id, server.name);
    Ok(())
}

fn config(ctx: &AppContext, id: EntityId) -> Result<()> {
    let rendered = ctx.servers().render_config(id).map_err(CliError::from)?;
    print!("{rendered}");
    Ok(())
}
