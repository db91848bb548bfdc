#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use seedwatch::config::{ConfigFile, RawConfigFile, RepositoryEntry};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                repositories: BTreeMap::new(),
            },
        }
    }

    pub fn with_repository(mut self, name: &str, entry: RepositoryEntry) -> Self {
        self.config.repositories.insert(name.to_string(), entry);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RepositoryEntry`.
///
/// Defaults place the torrent, run location and seed location under `root`
/// using the repository name, e.g. `<root>/<name>.torrent`.
pub struct RepositoryBuilder {
    entry: RepositoryEntry,
}

impl RepositoryBuilder {
    pub fn new(root: &Path, name: &str, tracker_port: u16) -> Self {
        Self {
            entry: RepositoryEntry {
                torrent: root.join(format!("{name}.torrent")),
                run_location: root.join("run"),
                tracker_port,
                seed_location: root.join("artifacts").join(name),
                use_hash: false,
            },
        }
    }

    pub fn torrent(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry.torrent = path.into();
        self
    }

    pub fn run_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry.run_location = path.into();
        self
    }

    pub fn seed_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry.seed_location = path.into();
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.entry.use_hash = val;
        self
    }

    pub fn build(self) -> RepositoryEntry {
        self.entry
    }
}
