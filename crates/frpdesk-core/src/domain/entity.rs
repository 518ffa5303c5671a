//! The contract every supervisable definition implements.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::state::EntityState;
use super::validation::ValidationErrors;

/// Identifier within one entity collection. Assigned `max + 1`, starting
/// at 1 for an empty collection.
pub type EntityId = u64;

/// Which kind of frp process a definition drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// An frpc client forwarding one local service.
    Tunnel,
    /// An frps server accepting tunnel connections.
    Server,
}

impl EntityKind {
    /// Store key the kind's collection is persisted under.
    pub const fn store_key(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnels",
            Self::Server => "servers",
        }
    }

    /// File-name stem for materialized configs (`frpc-<id>.toml`).
    pub const fn config_stem(self) -> &'static str {
        match self {
            Self::Tunnel => "frpc",
            Self::Server => "frps",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication towards the frps server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Token,
}

impl AuthMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "token" => Ok(Self::Token),
            other => Err(format!(
                "unknown auth mode {other:?} (expected none or token)"
            )),
        }
    }
}

/// A persisted, supervisable definition (tunnel client or frps server).
///
/// Implementations are pure data. Construction and patching validate and
/// return a new value rather than mutating in place, and config rendering
/// does no I/O, so previews and tests work without touching the
/// filesystem.
pub trait Definition:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// All fields needed to create a definition of this kind.
    type Draft: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Partial update; `None` fields keep their current value.
    type Patch: Clone + fmt::Debug + Default + Send + Sync + 'static;

    const KIND: EntityKind;

    /// Validate a draft and build the definition, with fresh lifecycle
    /// state stamped `now`.
    fn from_draft(id: EntityId, draft: Self::Draft, now: DateTime<Utc>)
    -> Result<Self, ValidationErrors>;

    /// Apply a patch to `self`, re-validating and re-deriving dependent
    /// fields. Lifecycle state is preserved apart from `updated_at`.
    fn apply_patch(&self, patch: Self::Patch, now: DateTime<Utc>) -> Result<Self, ValidationErrors>;

    fn id(&self) -> EntityId;

    fn name(&self) -> &str;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// Draft that would recreate this definition (export support).
    fn to_draft(&self) -> Self::Draft;

    /// Render the frp config file contents for this definition.
    fn render_config(&self) -> String;
}
