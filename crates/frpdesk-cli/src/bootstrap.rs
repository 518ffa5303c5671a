//! CLI bootstrap - the composition root.
//!
//! This is the only place where infrastructure is wired together: the
//! JSON file store, the process supervisor, the config directory, the two
//! orchestrators, and the reconciler over them. Command handlers receive
//! the composed [`AppContext`] and never construct adapters themselves.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use frpdesk_core::domain::{ServerDefinition, TunnelDefinition};
use frpdesk_core::paths::{configs_dir, data_root, store_path};
use frpdesk_core::ports::{ConfigMaterializerPort, KvStore, ProcessSupervisorPort};
use frpdesk_core::services::{EntityStore, Orchestrator, Reconciler};
use frpdesk_runtime::{ConfigDir, ProcessSupervisor};
use frpdesk_store::JsonFileStore;

use crate::error::CliError;

/// Resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory holding the store file and materialized configs.
    pub data_dir: PathBuf,
    /// frpc binary to spawn for tunnels.
    pub frpc_bin: PathBuf,
    /// frps binary to spawn for servers.
    pub frps_bin: PathBuf,
}

impl CliConfig {
    /// Defaults: data dir from `FRPDESK_HOME` or `~/.frpdesk`, binaries
    /// resolved from `PATH`.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            data_dir: data_root().map_err(CliError::from)?,
            frpc_bin: PathBuf::from("frpc"),
            frps_bin: PathBuf::from("frps"),
        })
    }
}

/// Fully composed application context for command handlers.
pub struct AppContext {
    tunnels: Orchestrator<TunnelDefinition>,
    servers: Orchestrator<ServerDefinition>,
    reconciler: Reconciler,
    supervisor: Arc<dyn ProcessSupervisorPort>,
    data_dir: PathBuf,
}

impl AppContext {
    pub fn tunnels(&self) -> &Orchestrator<TunnelDefinition> {
        &self.tunnels
    }

    pub fn servers(&self) -> &Orchestrator<ServerDefinition> {
        &self.servers
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn supervisor(&self) -> &Arc<dyn ProcessSupervisorPort> {
        &self.supervisor
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }
}

/// Bootstrap the application.
///
/// Must run inside a tokio runtime; the orchestrators spawn their event
/// watchers on construction.
pub fn bootstrap(config: CliConfig) -> Result<AppContext> {
    let kv: Arc<dyn KvStore> = Arc::new(
        JsonFileStore::open(store_path(&config.data_dir)).map_err(CliError::from)?,
    );
    let supervisor: Arc<dyn ProcessSupervisorPort> = Arc::new(ProcessSupervisor::new());
    let materializer: Arc<dyn ConfigMaterializerPort> =
        Arc::new(ConfigDir::new(configs_dir(&config.data_dir)));

    compose(kv, supervisor, materializer, config)
}

/// Wire an [`AppContext`] from explicit adapters. This is what tests use
/// to run handlers against an in-memory store.
pub fn compose(
    kv: Arc<dyn KvStore>,
    supervisor: Arc<dyn ProcessSupervisorPort>,
    materializer: Arc<dyn ConfigMaterializerPort>,
    config: CliConfig,
) -> Result<AppContext> {
    let tunnels = Orchestrator::new(
        EntityStore::new(Arc::clone(&kv)),
        Arc::clone(&supervisor),
        Arc::clone(&materializer),
        config.frpc_bin,
    );
    let servers = Orchestrator::new(
        EntityStore::new(kv),
        Arc::clone(&supervisor),
        materializer,
        config.frps_bin,
    );
    let reconciler = Reconciler::new(tunnels.clone(), servers.clone());

    Ok(AppContext {
        tunnels,
        servers,
        reconciler,
        supervisor,
        data_dir: config.data_dir,
    })
}
