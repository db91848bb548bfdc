// src/cli.rs

//! CLI argument parsing using `clap`.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::reconcile::{DEFAULT_SEEDER_BIN, DEFAULT_TRACKER_BIN};
use crate::types::ChangePolicy;

/// Command-line arguments for `seedwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "seedwatch",
    version,
    about = "Restart per-repository trackers and seeders whenever a torrent file changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Repository configuration (YAML, or TOML when the file ends in `.toml`).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SEEDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config, print repositories and derived files, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Tracker executable, run as `--port <port> --dfile <state file>`.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_TRACKER_BIN)]
    pub tracker_bin: PathBuf,

    /// Seeder executable, run as `seed <torrent> <seed location> <address>`.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SEEDER_BIN)]
    pub seeder_bin: PathBuf,

    /// Address handed to seeders instead of resolving this host's name.
    #[arg(long, value_name = "IP")]
    pub advertise_address: Option<IpAddr>,

    /// What to do with changes that arrive while a redeploy is running.
    #[arg(long, value_enum, value_name = "POLICY", default_value = "coalesce")]
    pub on_change: ChangePolicy,

    /// Redeploy every repository whose torrent exists right at startup.
    #[arg(long)]
    pub reconcile_on_start: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
