//! Root CLI parser and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for managing frp tunnels and servers.
///
/// Global options apply to every subcommand; the data directory can also
/// come from the `FRPDESK_HOME` environment variable.
#[derive(Parser)]
#[command(name = "frpdesk")]
#[command(about = "Manage frp tunnels and servers from the terminal")]
#[command(version)]
pub struct Cli {
    /// Override the data directory for this invocation
    #[arg(long = "data-dir", global = true, env = "FRPDESK_HOME", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to the frpc binary (default: frpc from PATH)
    #[arg(long = "frpc-bin", global = true, value_name = "PATH")]
    pub frpc_bin: Option<PathBuf>,

    /// Path to the frps binary (default: frps from PATH)
    #[arg(long = "frps-bin", global = true, value_name = "PATH")]
    pub frps_bin: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
