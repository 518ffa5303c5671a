//! Startup reconciliation and coordinated shutdown across both kinds.

use tracing::{info, warn};

use crate::domain::{ServerDefinition, TunnelDefinition};
use crate::services::orchestrator::{
    Orchestrator, OrchestratorError, ReconcileStats, StopAllResult,
};

/// Outcome of a full reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tunnels: ReconcileStats,
    pub servers: ReconcileStats,
}

impl ReconcileReport {
    pub const fn checked(&self) -> usize {
        self.tunnels.checked + self.servers.checked
    }

    pub const fn corrected(&self) -> usize {
        self.tunnels.corrected + self.servers.corrected
    }
}

/// Outcome of a coordinated shutdown sweep.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub tunnels: Vec<StopAllResult>,
    pub servers: Vec<StopAllResult>,
}

impl ShutdownReport {
    fn entries(&self) -> impl Iterator<Item = &StopAllResult> {
        self.tunnels.iter().chain(self.servers.iter())
    }

    pub fn stopped(&self) -> usize {
        self.entries().filter(|r| r.result.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<&StopAllResult> {
        self.entries().filter(|r| r.result.is_err()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.entries().all(|r| r.result.is_ok())
    }
}

/// Cross-kind coordinator for the operations that span tunnels and
/// servers together.
pub struct Reconciler {
    tunnels: Orchestrator<TunnelDefinition>,
    servers: Orchestrator<ServerDefinition>,
}

impl Reconciler {
    pub const fn new(
        tunnels: Orchestrator<TunnelDefinition>,
        servers: Orchestrator<ServerDefinition>,
    ) -> Self {
        Self { tunnels, servers }
    }

    /// Align every persisted record with what is actually running. Run at
    /// startup so stale claims from a previous host never mislead status
    /// output or block stops.
    pub async fn reconcile(&self) -> Result<ReconcileReport, OrchestratorError> {
        let tunnels = self.tunnels.reconcile().await?;
        let servers = self.servers.reconcile().await?;
        let report = ReconcileReport { tunnels, servers };
        if report.corrected() > 0 {
            info!(
                checked = report.checked(),
                corrected = report.corrected(),
                "reconciled persisted state"
            );
        }
        Ok(report)
    }

    /// Stop everything, tunnels before the servers they connect to. One
    /// kind failing to enumerate never leaves the other running.
    pub async fn shutdown(&self) -> ShutdownReport {
        let tunnels = match self.tunnels.stop_all().await {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "tunnel shutdown sweep failed");
                Vec::new()
            }
        };
        let servers = match self.servers.stop_all().await {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "server shutdown sweep failed");
                Vec::new()
            }
        };
        ShutdownReport { tunnels, servers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_store::EntityStore;
    use crate::test_support::{
        FakeMaterializer, FakeSupervisor, MemKv, server_draft, tunnel_draft,
    };
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Fixture {
        reconciler: Reconciler,
        tunnels: Orchestrator<TunnelDefinition>,
        servers: Orchestrator<ServerDefinition>,
        supervisor: Arc<FakeSupervisor>,
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(MemKv::default());
        let supervisor = Arc::new(FakeSupervisor::new());
        let materializer = Arc::new(FakeMaterializer::default());
        let tunnels = Orchestrator::new(
            EntityStore::new(kv.clone()),
            supervisor.clone(),
            materializer.clone(),
            PathBuf::from("frpc"),
        );
        let servers = Orchestrator::new(
            EntityStore::new(kv),
            supervisor.clone(),
            materializer,
            PathBuf::from("frps"),
        );
        Fixture {
            reconciler: Reconciler::new(tunnels.clone(), servers.clone()),
            tunnels,
            servers,
            supervisor,
        }
    }

    #[tokio::test]
    async fn reconcile_covers_both_kinds() {
        let f = fixture();
        let tunnel = f.tunnels.add(tunnel_draft("t")).unwrap().id;
        let server = f.servers.add(server_draft("s")).unwrap().id;
        let tunnel_pid = f.tunnels.start(tunnel).await.unwrap().state.pid.unwrap();
        f.servers.start(server).await.unwrap();

        f.supervisor.vanish(tunnel_pid);
        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.checked(), 2);
        assert_eq!(report.corrected(), 1);
        assert_eq!(report.tunnels.corrected, 1);
        assert_eq!(report.servers.corrected, 0);
    }

    #[tokio::test]
    async fn shutdown_stops_tunnels_then_servers() {
        let f = fixture();
        let tunnel = f.tunnels.add(tunnel_draft("t")).unwrap().id;
        let server = f.servers.add(server_draft("s")).unwrap().id;
        let tunnel_pid = f.tunnels.start(tunnel).await.unwrap().state.pid.unwrap();
        let server_pid = f.servers.start(server).await.unwrap().state.pid.unwrap();

        let report = f.reconciler.shutdown().await;
        assert!(report.is_clean());
        assert_eq!(report.stopped(), 2);

        let stops = f.supervisor.stops.lock().unwrap().clone();
        let tunnel_stop = stops.iter().position(|&p| p == tunnel_pid).unwrap();
        let server_stop = stops.iter().position(|&p| p == server_pid).unwrap();
        assert!(tunnel_stop < server_stop);
    }

    #[tokio::test]
    async fn shutdown_reports_per_entity_failures() {
        let f = fixture();
        let ok = f.tunnels.add(tunnel_draft("ok")).unwrap().id;
        let bad = f.tunnels.add(tunnel_draft("bad")).unwrap().id;
        f.tunnels.start(ok).await.unwrap();
        let bad_pid = f.tunnels.start(bad).await.unwrap().state.pid.unwrap();
        f.supervisor.fail_stop_pids.lock().unwrap().insert(bad_pid);
        f.supervisor.fail_kill_pids.lock().unwrap().insert(bad_pid);

        let report = f.reconciler.shutdown().await;
        assert!(!report.is_clean());
        assert_eq!(report.stopped(), 1);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, bad);
    }
}
