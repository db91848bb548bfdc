// src/watch/watcher.rs

use std::path::Path;
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SeedwatchError};
use crate::reconcile::Reconcile;
use crate::types::ChangePolicy;
use crate::watch::router::{WatchBinding, WatchRouter};

/// Behaviour shared by all watch loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub policy: ChangePolicy,
    /// Reconcile every repository whose torrent exists as soon as its loop
    /// starts, instead of waiting for the first change.
    pub reconcile_on_start: bool,
}

/// A reconciliation error after which the daemon has to stop.
#[derive(Debug)]
pub struct FatalError {
    pub repository: String,
    pub error: SeedwatchError,
}

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "repository '{}': {}", self.repository, self.error)
    }
}

impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// One repository's notify watcher plus the loop consuming its events.
struct RepositoryWatcher {
    repository: String,
    _inner: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// The set of per-repository watch loops.
///
/// Loops run until the process exits. Dropping the group drops the notify
/// watchers, which closes every loop's event channel and ends it.
pub struct WatcherGroup {
    watchers: Vec<RepositoryWatcher>,
    failed: Vec<String>,
}

impl std::fmt::Debug for WatcherGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherGroup")
            .field("repositories", &self.repositories())
            .field("failed", &self.failed)
            .finish()
    }
}

impl WatcherGroup {
    /// Start one watch loop per reconciler.
    ///
    /// Each reconciler is matched to its binding in `router` by repository
    /// name. A loop that cannot start is logged and recorded in
    /// [`WatcherGroup::failed`]; the others start regardless. Fatal
    /// reconciliation errors are reported on `fatal_tx`.
    pub fn spawn<R>(
        router: Arc<WatchRouter>,
        reconcilers: Vec<R>,
        options: WatchOptions,
        fatal_tx: mpsc::UnboundedSender<FatalError>,
    ) -> Self
    where
        R: Reconcile + 'static,
    {
        let mut watchers = Vec::with_capacity(reconcilers.len());
        let mut failed = Vec::new();

        for reconciler in reconcilers {
            let repository = reconciler.repository().to_string();
            let Some(binding) = router.binding_for(&repository).cloned() else {
                error!(repo = %repository, "no watch binding for repository; not watching it");
                failed.push(repository);
                continue;
            };

            match spawn_repository_watcher(
                binding,
                Arc::clone(&router),
                reconciler,
                options,
                fatal_tx.clone(),
            ) {
                Ok(watcher) => watchers.push(watcher),
                Err(err) => {
                    error!(repo = %repository, error = %err, "failed to start watch loop");
                    failed.push(repository);
                }
            }
        }

        info!(
            started = watchers.len(),
            failed = failed.len(),
            "watch loops started"
        );
        Self { watchers, failed }
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn repositories(&self) -> Vec<&str> {
        self.watchers.iter().map(|w| w.repository.as_str()).collect()
    }

    /// Repositories whose loop could not be started.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// True once any loop has ended (it only ends after a fatal error).
    pub fn any_finished(&self) -> bool {
        self.watchers.iter().any(|w| w.task.is_finished())
    }
}

fn spawn_repository_watcher<R>(
    binding: WatchBinding,
    router: Arc<WatchRouter>,
    reconciler: R,
    options: WatchOptions,
    fatal_tx: mpsc::UnboundedSender<FatalError>,
) -> Result<RepositoryWatcher>
where
    R: Reconcile + 'static,
{
    let repository = binding.repository().to_string();

    // Channel from the blocking notify callback into the async loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver only goes away once the loop has ended.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;

    // Watch the directory rather than the file, so the torrent may be
    // created, or replaced by a rename, after the watch starts.
    let dir = binding.config().torrent_dir().to_path_buf();
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    info!(repo = %repository, dir = ?dir, torrent = ?binding.torrent(), "watching torrent");

    let task = tokio::spawn(watch_loop(binding, router, reconciler, event_rx, options, fatal_tx));

    Ok(RepositoryWatcher {
        repository,
        _inner: watcher,
        task,
    })
}

async fn watch_loop<R>(
    binding: WatchBinding,
    router: Arc<WatchRouter>,
    mut reconciler: R,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    options: WatchOptions,
    fatal_tx: mpsc::UnboundedSender<FatalError>,
) where
    R: Reconcile,
{
    let repository = binding.repository().to_string();

    if options.reconcile_on_start && torrent_exists(binding.torrent()).await {
        info!(repo = %repository, "initial reconcile");
        let result = reconciler.reconcile().await;
        if !handle_result(&repository, result, &fatal_tx) {
            return;
        }
    }

    while let Some(res) = events.recv().await {
        let mut event = match res {
            Ok(event) => event,
            Err(err) => {
                warn!(repo = %repository, error = %err, "file watch error");
                continue;
            }
        };

        if options.policy == ChangePolicy::Coalesce {
            // Collapse what is already buffered into one reconciliation,
            // keeping the latest event that concerns us.
            let mut coalesced = 0usize;
            while let Ok(next) = events.try_recv() {
                let Ok(next) = next else { continue };
                if is_own_change(&router, &next, &repository) {
                    event = next;
                    coalesced += 1;
                }
            }
            if coalesced > 0 {
                debug!(repo = %repository, coalesced, "coalesced pending change events");
            }
        }

        let Some(result) = router.dispatch(&event, &mut reconciler).await else {
            continue;
        };
        if !handle_result(&repository, result, &fatal_tx) {
            break;
        }
    }

    debug!(repo = %repository, "watch loop finished");
}

fn is_own_change(router: &WatchRouter, event: &Event, repository: &str) -> bool {
    router
        .route(event)
        .is_some_and(|b| b.repository() == repository)
}

async fn torrent_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Log a reconciliation result. Returns `false` if the loop must stop.
fn handle_result(
    repository: &str,
    result: Result<crate::reconcile::ReconcileReport>,
    fatal_tx: &mpsc::UnboundedSender<FatalError>,
) -> bool {
    match result {
        Ok(report) => {
            if !report.is_redeployed() {
                return true;
            }
            let failures = report.failures();
            if failures.is_empty() {
                info!(
                    repo = %repository,
                    tracker_pid = ?report.tracker_pid(),
                    seeder_pid = ?report.seeder_pid(),
                    "redeploy complete"
                );
            } else {
                for (role, err) in failures {
                    error!(repo = %repository, %role, error = %err, "redeploy incomplete");
                }
            }
            true
        }
        Err(error) if error.is_fatal() => {
            error!(repo = %repository, error = %error, "fatal reconciliation error");
            let _ = fatal_tx.send(FatalError {
                repository: repository.to_string(),
                error,
            });
            false
        }
        Err(error) => {
            error!(repo = %repository, error = %error, "reconciliation failed");
            true
        }
    }
}
