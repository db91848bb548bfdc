// src/watch/router.rs

//! Mapping filesystem events to the repository they concern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;
use tracing::{debug, trace};

use crate::config::{ConfigFile, RepositoryConfig};
use crate::errors::Result;
use crate::reconcile::{Reconcile, ReconcileReport};

/// A watched torrent path and the repository that owns it.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    repo: Arc<RepositoryConfig>,
}

impl WatchBinding {
    pub fn new(repo: Arc<RepositoryConfig>) -> Self {
        Self { repo }
    }

    pub fn torrent(&self) -> &Path {
        &self.repo.torrent
    }

    pub fn repository(&self) -> &str {
        &self.repo.name
    }

    pub fn config(&self) -> &Arc<RepositoryConfig> {
        &self.repo
    }
}

/// Read-only `torrent path -> binding` table, built once at startup and
/// shared by every watch loop.
///
/// Matching is exact: `/x/A.torrent` never resolves to the binding for
/// `/x/AB.torrent`, and unrelated files in a watched directory resolve to
/// nothing.
#[derive(Debug, Default)]
pub struct WatchRouter {
    bindings: HashMap<PathBuf, WatchBinding>,
}

impl WatchRouter {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_repositories(cfg.repositories().cloned())
    }

    pub fn from_repositories(repos: impl IntoIterator<Item = Arc<RepositoryConfig>>) -> Self {
        let bindings = repos
            .into_iter()
            .map(|repo| (repo.torrent.clone(), WatchBinding::new(repo)))
            .collect();
        Self { bindings }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding_for(&self, repository: &str) -> Option<&WatchBinding> {
        self.bindings.values().find(|b| b.repository() == repository)
    }

    pub fn resolve(&self, path: &Path) -> Option<&WatchBinding> {
        self.bindings.get(path)
    }

    /// Event kinds that mean "the torrent has new content".
    ///
    /// Creation and modification are treated alike. A rename counts only on
    /// the destination side; metadata-only changes, reads and removals do
    /// not count.
    pub fn is_change(kind: &EventKind) -> bool {
        match kind {
            EventKind::Create(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        }
    }

    /// The binding a change event concerns, if any.
    pub fn route(&self, event: &Event) -> Option<&WatchBinding> {
        if !Self::is_change(&event.kind) {
            trace!(kind = ?event.kind, "ignoring non-change event");
            return None;
        }
        // For `RenameMode::Both` the destination comes last.
        event.paths.iter().rev().find_map(|p| self.resolve(p))
    }

    /// Run `reconciler` if `event` is a change to its repository's torrent.
    ///
    /// Returns `None` when the event concerns some other file (or another
    /// repository sharing the directory).
    pub async fn dispatch<R>(&self, event: &Event, reconciler: &mut R) -> Option<Result<ReconcileReport>>
    where
        R: Reconcile + ?Sized,
    {
        let binding = self.route(event)?;
        if binding.repository() != reconciler.repository() {
            trace!(
                owner = %binding.repository(),
                watcher = %reconciler.repository(),
                "event belongs to another repository"
            );
            return None;
        }
        debug!(repo = %binding.repository(), torrent = ?binding.torrent(), "torrent changed");
        Some(reconciler.reconcile().await)
    }
}
