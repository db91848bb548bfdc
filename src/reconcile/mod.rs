// src/reconcile/mod.rs

//! Per-repository redeploys.
//!
//! The watch layer talks to a [`Reconcile`] implementation rather than to
//! [`RepositoryReconciler`] directly, so tests can plug in a fake that
//! records invocations instead of spawning trackers and seeders.

pub mod host;
pub mod reconciler;

use std::future::Future;
use std::pin::Pin;

use crate::errors::{Result, SeedwatchError};
use crate::supervisor::StopOutcome;
use crate::types::Role;

pub use host::{HostResolver, StaticHostResolver, SystemHostResolver};
pub use reconciler::{ChildCommands, RepositoryReconciler, DEFAULT_SEEDER_BIN, DEFAULT_TRACKER_BIN};

/// Brings one repository's processes in line with its current torrent.
pub trait Reconcile: Send {
    /// Name of the repository this reconciler owns.
    fn repository(&self) -> &str;

    /// Run one reconciliation.
    ///
    /// `Err` is reserved for failures that make further work pointless (see
    /// [`SeedwatchError::is_fatal`]); everything else belongs in the report.
    fn reconcile(&mut self) -> Pin<Box<dyn Future<Output = Result<ReconcileReport>> + Send + '_>>;
}

/// What happened to one role during a redeploy.
#[derive(Debug)]
pub struct RoleReport {
    pub role: Role,
    pub stopped: StopOutcome,
    /// Pid of the replacement.
    pub started: Result<u32>,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// `use_hash` saw the same torrent content as last time.
    Unchanged,
    Redeployed {
        tracker: RoleReport,
        seeder: RoleReport,
    },
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub repository: String,
    pub outcome: ReconcileOutcome,
}

impl ReconcileReport {
    pub fn unchanged(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            outcome: ReconcileOutcome::Unchanged,
        }
    }

    pub fn redeployed(repository: impl Into<String>, tracker: RoleReport, seeder: RoleReport) -> Self {
        Self {
            repository: repository.into(),
            outcome: ReconcileOutcome::Redeployed { tracker, seeder },
        }
    }

    pub fn is_redeployed(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Redeployed { .. })
    }

    /// True unless a replacement failed to start.
    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn tracker_pid(&self) -> Option<u32> {
        self.role(Role::Tracker).and_then(|r| r.started.as_ref().ok().copied())
    }

    pub fn seeder_pid(&self) -> Option<u32> {
        self.role(Role::Seeder).and_then(|r| r.started.as_ref().ok().copied())
    }

    pub fn role(&self, role: Role) -> Option<&RoleReport> {
        match &self.outcome {
            ReconcileOutcome::Unchanged => None,
            ReconcileOutcome::Redeployed { tracker, seeder } => match role {
                Role::Tracker => Some(tracker),
                Role::Seeder => Some(seeder),
            },
        }
    }

    pub fn failures(&self) -> Vec<(Role, &SeedwatchError)> {
        [Role::Tracker, Role::Seeder]
            .into_iter()
            .filter_map(|role| {
                self.role(role)
                    .and_then(|r| r.started.as_ref().err())
                    .map(|err| (role, err))
            })
            .collect()
    }
}
