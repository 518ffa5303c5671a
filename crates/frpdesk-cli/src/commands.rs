//! Subcommand definitions for the frpdesk CLI.
//!
//! Layout is `frpdesk <noun> <verb>` for definition management plus the
//! top-level lifecycle commands (`up`, `stop`, `status`, `reconcile`).

use std::path::PathBuf;

use clap::{Args, Subcommand};

use frpdesk_core::domain::{
    AuthMode, EntityId, Protocol, ServerDraft, ServerPatch, TunnelDraft, TunnelPatch,
};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage tunnel definitions (frpc side)
    Tunnel {
        #[command(subcommand)]
        command: TunnelCommand,
    },

    /// Manage server definitions (frps side)
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },

    /// Start entities and stream their output until interrupted
    Up {
        #[command(flatten)]
        selection: Selection,
    },

    /// Stop running entities
    Stop {
        #[command(flatten)]
        selection: Selection,
    },

    /// Reconcile persisted state, then tabulate every definition
    Status,

    /// Repair persisted records that contradict the live process table
    Reconcile,
}

/// Which entities a lifecycle command operates on.
#[derive(Args, Default)]
pub struct Selection {
    /// Tunnel id to include (repeatable)
    #[arg(long = "tunnel", value_name = "ID")]
    pub tunnels: Vec<EntityId>,

    /// Server id to include (repeatable)
    #[arg(long = "server", value_name = "ID")]
    pub servers: Vec<EntityId>,

    /// Include every definition
    #[arg(long, conflicts_with_all = ["tunnels", "servers"])]
    pub all: bool,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        !self.all && self.tunnels.is_empty() && self.servers.is_empty()
    }
}

/// Verbs on tunnel definitions.
#[derive(Subcommand)]
pub enum TunnelCommand {
    /// Create a tunnel definition
    Add(TunnelAddArgs),

    /// List all tunnel definitions
    List,

    /// Show one tunnel in detail
    Show { id: EntityId },

    /// Update fields on an existing tunnel
    Set {
        id: EntityId,
        #[command(flatten)]
        changes: TunnelSetArgs,
    },

    /// Delete a tunnel definition
    Rm {
        id: EntityId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Print the frpc config that a start would write
    Config { id: EntityId },

    /// Write all tunnel definitions as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Import tunnel definitions from a JSON file
    Import { file: PathBuf },
}

/// Verbs on server definitions.
#[derive(Subcommand)]
pub enum ServerCommand {
    /// Create a server definition
    Add(ServerAddArgs),

    /// List all server definitions
    List,

    /// Show one server in detail
    Show { id: EntityId },

    /// Update fields on an existing server
    Set {
        id: EntityId,
        #[command(flatten)]
        changes: ServerSetArgs,
    },

    /// Delete a server definition
    Rm {
        id: EntityId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Print the frps config that a start would write
    Config { id: EntityId },
}

#[derive(Args)]
pub struct TunnelAddArgs {
    /// Display name, unique per kind
    #[arg(long)]
    pub name: String,

    /// Forwarded protocol: tcp, udp, http or https
    #[arg(long, default_value = "tcp")]
    pub protocol: Protocol,

    /// Local service address as host:port
    #[arg(long = "local-addr", value_name = "HOST:PORT")]
    pub local_addr: String,

    /// frps server address as host:port
    #[arg(long = "server-addr", value_name = "HOST:PORT")]
    pub server_addr: String,

    /// Public port exposed on the server
    #[arg(long = "remote-port")]
    pub remote_port: u16,

    /// Authentication towards the server: none or token
    #[arg(long = "auth-mode", default_value = "none")]
    pub auth_mode: AuthMode,

    /// Token to present when auth mode is token
    #[arg(long = "auth-token")]
    pub auth_token: Option<String>,
}

impl TunnelAddArgs {
    pub fn into_draft(self) -> TunnelDraft {
        TunnelDraft {
            name: self.name,
            protocol: self.protocol,
            local_addr: self.local_addr,
            server_addr: self.server_addr,
            remote_port: self.remote_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token,
        }
    }
}

#[derive(Args, Default)]
pub struct TunnelSetArgs {
    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New protocol: tcp, udp, http or https
    #[arg(long)]
    pub protocol: Option<Protocol>,

    /// New local service address as host:port
    #[arg(long = "local-addr", value_name = "HOST:PORT")]
    pub local_addr: Option<String>,

    /// New frps server address as host:port
    #[arg(long = "server-addr", value_name = "HOST:PORT")]
    pub server_addr: Option<String>,

    /// New public port exposed on the server
    #[arg(long = "remote-port")]
    pub remote_port: Option<u16>,

    /// New authentication mode: none or token
    #[arg(long = "auth-mode")]
    pub auth_mode: Option<AuthMode>,

    /// New token for token auth
    #[arg(long = "auth-token")]
    pub auth_token: Option<String>,
}

impl TunnelSetArgs {
    pub fn into_patch(self) -> TunnelPatch {
        TunnelPatch {
            name: self.name,
            protocol: self.protocol,
            local_addr: self.local_addr,
            server_addr: self.server_addr,
            remote_port: self.remote_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token,
        }
    }
}

#[derive(Args)]
pub struct ServerAddArgs {
    /// Display name, unique per kind
    #[arg(long)]
    pub name: String,

    /// Port frps listens on for tunnel connections
    #[arg(long = "bind-port")]
    pub bind_port: u16,

    /// Authentication required from clients: none or token
    #[arg(long = "auth-mode", default_value = "none")]
    pub auth_mode: AuthMode,

    /// Token clients must present when auth mode is token
    #[arg(long = "auth-token")]
    pub auth_token: Option<String>,
}

impl ServerAddArgs {
    pub fn into_draft(self) -> ServerDraft {
        ServerDraft {
            name: self.name,
            bind_port: self.bind_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token,
        }
    }
}

#[derive(Args, Default)]
pub struct ServerSetArgs {
    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New bind port
    #[arg(long = "bind-port")]
    pub bind_port: Option<u16>,

    /// New authentication mode: none or token
    #[arg(long = "auth-mode")]
    pub auth_mode: Option<AuthMode>,

    /// New token for token auth
    #[arg(long = "auth-token")]
    pub auth_token: Option<String>,
}

impl ServerSetArgs {
    pub fn into_patch(self) -> ServerPatch {
        ServerPatch {
            name: self.name,
            bind_port: self.bind_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn tunnel_add_maps_flags_onto_the_draft() {
        let parsed = Harness::parse_from([
            "frpdesk",
            "tunnel",
            "add",
            "--name",
            "web",
            "--local-addr",
            "127.0.0.1:3000",
            "--server-addr",
            "frps.example.com:7000",
            "--remote-port",
            "9100",
            "--auth-mode",
            "token",
            "--auth-token",
            "secret",
        ]);

        let Commands::Tunnel {
            command: TunnelCommand::Add(args),
        } = parsed.command
        else {
            panic!("expected tunnel add");
        };

        let draft = args.into_draft();
        assert_eq!(draft.name, "web");
        assert_eq!(draft.protocol, Protocol::Tcp);
        assert_eq!(draft.remote_port, 9100);
        assert_eq!(draft.auth_mode, AuthMode::Token);
        assert_eq!(draft.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn selection_flags_accumulate() {
        let parsed = Harness::parse_from([
            "frpdesk", "up", "--tunnel", "1", "--tunnel", "2", "--server", "1",
        ]);

        let Commands::Up { selection } = parsed.command else {
            panic!("expected up");
        };
        assert_eq!(selection.tunnels, vec![1, 2]);
        assert_eq!(selection.servers, vec![1]);
        assert!(!selection.all);
        assert!(!selection.is_empty());
    }

    #[test]
    fn all_conflicts_with_explicit_ids() {
        let result = Harness::try_parse_from(["frpdesk", "stop", "--all", "--tunnel", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_selection_is_detected() {
        let parsed = Harness::parse_from(["frpdesk", "stop"]);
        let Commands::Stop { selection } = parsed.command else {
            panic!("expected stop");
        };
        assert!(selection.is_empty());
    }
}
