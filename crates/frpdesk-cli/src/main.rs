//! CLI entry point - the composition root.
//!
//! The only place where infrastructure is wired together, via
//! [`bootstrap`]. Command dispatch routes to handlers, which delegate to
//! the orchestrators behind the composed application context.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use frpdesk_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err
            .downcast_ref::<CliError>()
            .map_or(1, CliError::exit_code);
        eprintln!("error: {err:#}");
        std::process::exit(code);
    }
}

/// Diagnostics go to stderr so command output on stdout stays pipeable.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "info,frpdesk_cli=debug,frpdesk_core=debug,frpdesk_store=debug,frpdesk_runtime=debug"
        } else {
            "warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::with_defaults()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(frpc_bin) = cli.frpc_bin {
        config.frpc_bin = frpc_bin;
    }
    if let Some(frps_bin) = cli.frps_bin {
        config.frps_bin = frps_bin;
    }

    // No command: show help without touching the data directory.
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(config)?;
    match command {
        Commands::Tunnel { command } => handlers::tunnel::execute(&ctx, command).await,
        Commands::Server { command } => handlers::server::execute(&ctx, command).await,
        Commands::Up { selection } => handlers::up::execute(&ctx, selection).await,
        Commands::Stop { selection } => handlers::stop::execute(&ctx, selection).await,
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Reconcile => handlers::reconcile::execute(&ctx).await,
    }
}
