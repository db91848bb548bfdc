// src/reconcile/reconciler.rs

use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::RepositoryConfig;
use crate::errors::Result;
use crate::supervisor::{remove_if_present, LaunchSpec, ManagedProcess, ProcessSupervisor};
use crate::types::Role;
use crate::watch::hash::compute_file_hash;

use super::host::HostResolver;
use super::{Reconcile, ReconcileReport, RoleReport};

/// Executables launched for each repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommands {
    pub tracker_bin: PathBuf,
    pub seeder_bin: PathBuf,
}

pub const DEFAULT_TRACKER_BIN: &str = "/usr/bin/bttrack";
pub const DEFAULT_SEEDER_BIN: &str = "/usr/local/bin/murder_client";

impl Default for ChildCommands {
    fn default() -> Self {
        Self {
            tracker_bin: PathBuf::from(DEFAULT_TRACKER_BIN),
            seeder_bin: PathBuf::from(DEFAULT_SEEDER_BIN),
        }
    }
}

impl ChildCommands {
    /// `<tracker_bin> --port <port> --dfile <run_location>/tracker_<port>.dstate`
    pub fn tracker(&self, repo: &RepositoryConfig) -> LaunchSpec {
        LaunchSpec::new(&self.tracker_bin)
            .arg("--port")
            .arg(repo.tracker_port.to_string())
            .arg("--dfile")
            .arg(repo.tracker_state_file())
    }

    /// `<seeder_bin> seed <torrent> <seed_location> <address>`
    pub fn seeder(&self, repo: &RepositoryConfig, address: IpAddr) -> LaunchSpec {
        LaunchSpec::new(&self.seeder_bin)
            .arg("seed")
            .arg(&repo.torrent)
            .arg(&repo.seed_location)
            .arg(address.to_string())
    }
}

/// Redeploys one repository's tracker/seeder pair.
///
/// Owned by exactly one watch loop, which is what serialises redeploys of the
/// same repository. Processes started here keep their handles so the next
/// redeploy can wait on them; anything else is adopted from its pid file.
#[derive(Debug)]
pub struct RepositoryReconciler {
    repo: Arc<RepositoryConfig>,
    supervisor: ProcessSupervisor,
    commands: Arc<ChildCommands>,
    resolver: Arc<dyn HostResolver>,
    tracker: Option<ManagedProcess>,
    seeder: Option<ManagedProcess>,
    last_hash: Option<String>,
}

impl RepositoryReconciler {
    pub fn new(
        repo: Arc<RepositoryConfig>,
        supervisor: ProcessSupervisor,
        commands: Arc<ChildCommands>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            repo,
            supervisor,
            commands,
            resolver,
            tracker: None,
            seeder: None,
            last_hash: None,
        }
    }

    pub fn repository_config(&self) -> &RepositoryConfig {
        &self.repo
    }

    /// The process currently believed to hold `role`, taking any handle we
    /// kept from a previous start.
    fn take_process(&mut self, role: Role) -> ManagedProcess {
        let slot = match role {
            Role::Tracker => &mut self.tracker,
            Role::Seeder => &mut self.seeder,
        };
        slot.take()
            .unwrap_or_else(|| ManagedProcess::adopt(role, self.repo.pid_file(role)))
    }

    async fn replace(&mut self, role: Role, launch: LaunchSpec) -> RoleReport {
        let previous = self.take_process(role);
        let stopped = self.supervisor.stop(previous).await;

        if role == Role::Tracker {
            // Peers must reconnect from scratch against the new tracker.
            remove_if_present(&self.repo.tracker_state_file());
        }

        let pid_file = self.repo.pid_file(role);
        let started = match self.supervisor.start(role, &launch, &pid_file).await {
            Ok(process) => {
                let pid = process.pid().unwrap_or_default();
                match role {
                    Role::Tracker => self.tracker = Some(process),
                    Role::Seeder => self.seeder = Some(process),
                }
                Ok(pid)
            }
            Err(err) => {
                error!(
                    repo = %self.repo.name,
                    %role,
                    error = %err,
                    "failed to start replacement"
                );
                Err(err)
            }
        };

        RoleReport {
            role,
            stopped,
            started,
        }
    }

    /// Stop tracker, clear its state, start tracker, stop seeder, start
    /// seeder.
    ///
    /// Fails only when the host address cannot be determined, in which case
    /// nothing has been touched. Start failures are reported per role in the
    /// returned report.
    pub async fn redeploy(&mut self) -> Result<ReconcileReport> {
        let fingerprint = torrent_fingerprint(&self.repo).await;
        if let (Some(new), Some(old)) = (&fingerprint, &self.last_hash) {
            if new == old {
                info!(repo = %self.repo.name, "torrent content unchanged; skipping redeploy");
                return Ok(ReconcileReport::unchanged(&self.repo.name));
            }
        }

        let address = self.resolver.resolve().await?;
        info!(repo = %self.repo.name, %address, "redeploying tracker and seeder");

        let tracker_launch = self.commands.tracker(&self.repo);
        let tracker = self.replace(Role::Tracker, tracker_launch).await;

        let seeder_launch = self.commands.seeder(&self.repo, address);
        let seeder = self.replace(Role::Seeder, seeder_launch).await;

        let report = ReconcileReport::redeployed(&self.repo.name, tracker, seeder);
        if report.is_complete() {
            self.last_hash = fingerprint;
        }
        debug!(repo = %self.repo.name, ?report, "redeploy finished");
        Ok(report)
    }
}

/// Content hash of the torrent when `use_hash` is enabled.
async fn torrent_fingerprint(repo: &RepositoryConfig) -> Option<String> {
    if !repo.use_hash {
        return None;
    }
    let torrent = repo.torrent.clone();
    match tokio::task::spawn_blocking(move || compute_file_hash(&torrent)).await {
        Ok(Ok(hash)) => Some(hash),
        Ok(Err(err)) => {
            warn!(repo = %repo.name, error = %err, "could not hash torrent; redeploying anyway");
            None
        }
        Err(err) => {
            warn!(repo = %repo.name, error = %err, "hashing task failed; redeploying anyway");
            None
        }
    }
}

impl Reconcile for RepositoryReconciler {
    fn repository(&self) -> &str {
        &self.repo.name
    }

    fn reconcile(&mut self) -> Pin<Box<dyn Future<Output = Result<ReconcileReport>> + Send + '_>> {
        Box::pin(self.redeploy())
    }
}
