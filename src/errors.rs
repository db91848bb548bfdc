// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Role;

#[derive(Error, Debug)]
pub enum SeedwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("could not determine this host's address: {0}")]
    HostAddress(String),

    #[error("failed to spawn {role} from {program:?}: {source}")]
    Spawn {
        role: Role,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write pid file {path:?}: {source}")]
    PidFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SeedwatchError {
    /// Errors after which the daemon must not keep serving.
    ///
    /// Without a reachable address a seeder would advertise something peers
    /// cannot connect to.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SeedwatchError::HostAddress(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SeedwatchError>;
