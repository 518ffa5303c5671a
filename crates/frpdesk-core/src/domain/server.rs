//! Server (frps) definitions: drafts, patches, validation, config rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{AuthMode, Definition, EntityId, EntityKind};
use super::state::EntityState;
use super::validation::ValidationErrors;

/// A declarative frps server: one bind port, optional token auth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDefinition {
    pub id: EntityId,
    pub name: String,
    /// Port frps listens on for tunnel connections.
    pub bind_port: u16,
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(flatten)]
    pub state: EntityState,
}

/// Fields required to create a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDraft {
    pub name: String,
    pub bind_port: u16,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Partial server update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerPatch {
    pub name: Option<String>,
    pub bind_port: Option<u16>,
    pub auth_mode: Option<AuthMode>,
    pub auth_token: Option<String>,
}

fn validate(draft: &ServerDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if draft.name.trim().is_empty() {
        errors.push("name", "must not be empty");
    }
    if draft.bind_port == 0 {
        errors.push("bindPort", "must be between 1 and 65535");
    }
    if draft.auth_mode == AuthMode::Token
        && draft.auth_token.as_deref().is_none_or(|t| t.trim().is_empty())
    {
        errors.push("authToken", "required when authMode is token");
    }
    errors.into_result(())
}

impl Definition for ServerDefinition {
    type Draft = ServerDraft;
    type Patch = ServerPatch;

    const KIND: EntityKind = EntityKind::Server;

    fn from_draft(
        id: EntityId,
        draft: ServerDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        validate(&draft)?;
        let auth_token = match draft.auth_mode {
            AuthMode::Token => draft.auth_token,
            AuthMode::None => None,
        };
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            bind_port: draft.bind_port,
            auth_mode: draft.auth_mode,
            auth_token,
            state: EntityState::new(now),
        })
    }

    fn apply_patch(
        &self,
        patch: ServerPatch,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let merged = ServerDraft {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            bind_port: patch.bind_port.unwrap_or(self.bind_port),
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

    fn to_draft(&self) -> ServerDraft {
        ServerDraft {
            name: self.name.clone(),
            bind_port: self.bind_port,
            auth_mode: self.auth_mode,
            auth_token: self.auth_token.clone(),
        }
    }

    fn render_config(&self) -> String {
        let mut out = String::from("# frps.toml\n");
        out.push_str(&format!("bindPort = {}\n", self.bind_port));
        if self.auth_mode == AuthMode::Token
            && let Some(token) = self.auth_token.as_deref()
        {
            out.push_str(&format!("auth.token = \"{token}\"\n"));
        }
        out
    }
}
