// src/config/validate.rs

use std::collections::HashMap;
use std::path::{Component, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile, RepositoryConfig};
use crate::errors::{Result, SeedwatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SeedwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let repositories = raw
            .repositories
            .into_iter()
            .map(|(name, entry)| RepositoryConfig::from_entry(name, entry))
            .collect();
        Ok(ConfigFile::new_unchecked(repositories))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_repositories(cfg)?;
    validate_paths(cfg)?;
    validate_unique_ports(cfg)?;
    validate_unique_torrents(cfg)?;
    Ok(())
}

fn ensure_has_repositories(cfg: &RawConfigFile) -> Result<()> {
    if cfg.repositories.is_empty() {
        return Err(SeedwatchError::ConfigError(
            "config must contain at least one repository".to_string(),
        ));
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    for (name, repo) in cfg.repositories.iter() {
        if name.trim().is_empty() {
            return Err(SeedwatchError::ConfigError(
                "repository names must not be empty".to_string(),
            ));
        }
        // Watch events carry absolute paths; a relative torrent would never match.
        if !repo.torrent.is_absolute() {
            return Err(SeedwatchError::ConfigError(format!(
                "repository '{}': torrent must be an absolute path (got {:?})",
                name, repo.torrent
            )));
        }
        // Watch events report the resolved path, so `..` would never match.
        if repo.torrent.components().any(|c| c == Component::ParentDir) {
            return Err(SeedwatchError::ConfigError(format!(
                "repository '{}': torrent {:?} must not contain '..'",
                name, repo.torrent
            )));
        }
        if repo.torrent.file_name().is_none() {
            return Err(SeedwatchError::ConfigError(format!(
                "repository '{}': torrent {:?} does not name a file",
                name, repo.torrent
            )));
        }
        if repo.run_location.as_os_str().is_empty() {
            return Err(SeedwatchError::ConfigError(format!(
                "repository '{}': run_location must not be empty",
                name
            )));
        }
        if repo.tracker_port == 0 {
            return Err(SeedwatchError::ConfigError(format!(
                "repository '{}': tracker_port must be >= 1 (got 0)",
                name
            )));
        }
    }
    Ok(())
}

fn validate_unique_ports(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashMap<u16, &str> = HashMap::new();
    for (name, repo) in cfg.repositories.iter() {
        if let Some(other) = seen.insert(repo.tracker_port, name.as_str()) {
            return Err(SeedwatchError::ConfigError(format!(
                "repositories '{}' and '{}' share tracker_port {}",
                other, name, repo.tracker_port
            )));
        }
    }
    Ok(())
}

fn validate_unique_torrents(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashMap<&PathBuf, &str> = HashMap::new();
    for (name, repo) in cfg.repositories.iter() {
        if let Some(other) = seen.insert(&repo.torrent, name.as_str()) {
            return Err(SeedwatchError::ConfigError(format!(
                "repositories '{}' and '{}' watch the same torrent {:?}",
                other, name, repo.torrent
            )));
        }
    }
    Ok(())
}
