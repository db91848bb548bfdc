// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::types::Role;

/// Configuration as read from disk, before validation.
///
/// The file is a flat mapping from repository name to its settings:
///
/// ```yaml
/// repo1:
///   torrent: /srv/repo1.torrent
///   run_location: /var/run/seed
///   tracker_port: 6969
///   seed_location: /srv/artifacts/repo1
/// ```
///
/// The TOML flavour uses one table per repository (`[repo1]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawConfigFile {
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

/// One repository's settings exactly as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryEntry {
    /// Torrent description whose modification signals a redeploy.
    ///
    /// Must be the path as the kernel reports it: absolute, without `..`,
    /// and not reached through a symlinked directory.
    pub torrent: PathBuf,

    /// Directory holding pid files and tracker state.
    pub run_location: PathBuf,

    /// Tracker listen port; also keys the derived file names.
    pub tracker_port: u16,

    /// Directory with the artifact payload to seed.
    pub seed_location: PathBuf,

    /// Only redeploy when the torrent's content actually changed.
    #[serde(default)]
    pub use_hash: bool,
}

/// A validated repository, shared read-only between the router and the
/// repository's watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub name: String,
    pub torrent: PathBuf,
    pub run_location: PathBuf,
    pub tracker_port: u16,
    pub seed_location: PathBuf,
    pub use_hash: bool,
}

impl RepositoryConfig {
    pub fn from_entry(name: impl Into<String>, entry: RepositoryEntry) -> Self {
        Self {
            name: name.into(),
            torrent: entry.torrent,
            run_location: entry.run_location,
            tracker_port: entry.tracker_port,
            seed_location: entry.seed_location,
            use_hash: entry.use_hash,
        }
    }

    /// `{run_location}/{role}_{tracker_port}.pid`
    pub fn pid_file(&self, role: Role) -> PathBuf {
        self.run_location
            .join(format!("{}_{}.pid", role.as_str(), self.tracker_port))
    }

    /// `{run_location}/tracker_{tracker_port}.dstate`, owned by the tracker
    /// binary. The daemon only ever deletes it.
    pub fn tracker_state_file(&self) -> PathBuf {
        self.run_location
            .join(format!("tracker_{}.dstate", self.tracker_port))
    }

    /// Directory a watcher has to observe to see the torrent being written,
    /// created or renamed into place.
    pub fn torrent_dir(&self) -> &Path {
        self.torrent.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    repositories: Vec<Arc<RepositoryConfig>>,
}

impl ConfigFile {
    /// Build without running validation. Only `validate.rs` should call this.
    pub(crate) fn new_unchecked(repositories: Vec<RepositoryConfig>) -> Self {
        Self {
            repositories: repositories.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Arc<RepositoryConfig>> {
        self.repositories.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RepositoryConfig>> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
