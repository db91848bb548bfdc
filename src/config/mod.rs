// src/config/mod.rs

//! Repository configuration.
//!
//! - `model.rs`: raw (serde) and validated data model, derived file paths.
//! - `loader.rs`: reading YAML or TOML from disk.
//! - `validate.rs`: the `RawConfigFile -> ConfigFile` conversion and its
//!   invariants.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str, ConfigFormat};
pub use model::{ConfigFile, RawConfigFile, RepositoryConfig, RepositoryEntry};
