//! Tunnel (frpc) definitions: drafts, patches, validation, config rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::endpoint::{Endpoint, Protocol};
use super::entity::{AuthMode, Definition, EntityId, EntityKind};
use super::state::EntityState;
use super::validation::ValidationErrors;

/// A declarative frpc tunnel: one local service exposed through a remote
/// frps server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelDefinition {
    pub id: EntityId,
    pub name: String,
    pub protocol: Protocol,
    /// Local service address as entered (`[proto://]host:port`).
    pub local_addr: String,
    /// frps server address as entered.
    pub server_addr: String,
    /// Public port the frps server exposes for this tunnel.
    pub remote_port: u16,
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Parsed form of `local_addr`.
    pub local: Endpoint,
    /// Parsed form of `server_addr`.
    pub server: Endpoint,
    #[serde(flatten)]
    pub state: EntityState,
}

/// Fields required to create a tunnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelDraft {
    pub name: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub local_addr: String,
    pub server_addr: String,
    pub remote_port: u16,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Partial tunnel update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TunnelPatch {
    pub name: Option<String>,
    pub protocol: Option<Protocol>,
    pub local_addr: Option<String>,
    pub server_addr: Option<String>,
    pub remote_port: Option<u16>,
    pub auth_mode: Option<AuthMode>,
    pub auth_token: Option<String>,
}

/// Check every field, collecting all failures. Returns the parsed
/// endpoints so construction does not parse twice.
fn validate(draft: &TunnelDraft) -> Result<(Endpoint, Endpoint), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if draft.name.trim().is_empty() {
        errors.push("name", "must not be empty");
    }
    let local = match Endpoint::parse(&draft.local_addr) {
        Ok(endpoint) => Some(endpoint),
        Err(e) => {
            errors.push("localAddr", e.to_string());
            None
        }
    };
    let server = match Endpoint::parse(&draft.server_addr) {
        Ok(endpoint) => Some(endpoint),
        Err(e) => {
            errors.push("serverAddr", e.to_string());
            None
        }
    };
    if draft.remote_port == 0 {
        errors.push("remotePort", "must be between 1 and 65535");
    }
    if draft.auth_mode == AuthMode::Token
        && draft.auth_token.as_deref().is_none_or(|t| t.trim().is_empty())
    {
        errors.push("authToken", "required when authMode is token");
    }
    match (local, server) {
        (Some(local), Some(server)) => errors.into_result((local, server)),
        _ => Err(errors),
    }
}

impl Definition for TunnelDefinition {
    type Draft = TunnelDraft;
    type Patch = TunnelPatch;

    const KIND: EntityKind = EntityKind::Tunnel;

    fn from_draft(
        id: EntityId,
        draft: TunnelDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let (local, server) = validate(&draft)?;
        // a token alongside authMode=none is ignored, not an error
        let auth_token = match draft.auth_mode {
            AuthMode::Token => draft.auth_token,
            AuthMode::None => None,
        };
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            protocol: draft.protocol,
            local_addr: draft.local_addr,
            server_addr: draft.server_addr,
            remote_port: draft.remote_port,
            auth_mode: draft.auth_mode,
            auth_token,
            local,
            server,
            state: EntityState::new(now),
        })
    }

    fn apply_patch(
        &self,
        patch: TunnelPatch,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let merged = TunnelDraft {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            protocol: patch.protocol.unwrap_or(self.protocol),
            local_addr: patch.local_addr.unwrap_or_else(|| self.local_addr.clone()),
            server_addr: patch.server_addr.unwrap_or_else(|| self.server_addr.clone()),
            remote_port: patch.remote_port.unwrap_or(self.remote_port),
            auth_mode: patch.auth_mode.unwrap_or(self.auth_mode),
            auth_token: patch.auth_token.or_else(|| self.auth_token.clone()),
        };
        let mut next = Self::from_draft(self.id, merged, now)?;
        next.state = self.state.clone();
        next.state.touch(now);
        Ok(next)
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn to_draft(&self) -> TunnelDraft {
        TunnelDraft {
            name: self.name.clone(),
            protocol: self.protocol,
            local_addr: self.local_addr.clone(),
            server_addr: self.server_addr.clone(),
            remote_port: self.remote_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token.clone(),
        }
    }

    fn render_config(&self) -> String {
        let mut out = String::from("# frpc.toml\n");
        out.push_str(&format!("serverAddr = \"{}\"\n", self.server.host));
        out.push_str(&format!("serverPort = {}\n", self.server.port));
        if self.auth_mode == AuthMode::Token
            && let Some(token) = self.auth_token.as_deref()
        {
            out.push_str(&format!("auth.token = \"{token}\"\n"));
        }
        out.push('\n');
        out.push_str("[[proxies]]\n");
        out.push_str(&format!("name = \"{}\"\n", self.name));
        out.push_str(&format!("type = \"{}\"\n", self.protocol.as_str()));
        out.push_str(&format!("localIP = \"{}\"\n", self.local.host));
        out.push_str(&format!("localPort = {}\n", self.local.port));
        out.push_str(&format!("remotePort = {}\n", self.remote_port));
        out
    }
}
