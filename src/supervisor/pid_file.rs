// src/supervisor/pid_file.rs

//! Reading and writing the single-integer pid files.

use std::fs;
use std::io;
use std::path::Path;

use nix::unistd::Pid;
use tracing::{debug, warn};

/// What a pid file on disk says about its process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidFileState {
    /// No file, or one we could not read.
    Missing,
    /// The file exists but does not hold a usable pid.
    Invalid(String),
    Pid(Pid),
}

/// Read and parse a pid file.
///
/// Pids `<= 0` are rejected: handed to `kill(2)` they would address a whole
/// process group instead of one process.
pub fn read_pid_file(path: &Path) -> PidFileState {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = ?path, "no pid file");
            return PidFileState::Missing;
        }
        Err(err) => {
            warn!(path = ?path, error = %err, "pid file unreadable; treating as absent");
            return PidFileState::Missing;
        }
    };

    match contents.trim().parse::<i32>() {
        Ok(raw) if raw > 0 => PidFileState::Pid(Pid::from_raw(raw)),
        _ => PidFileState::Invalid(contents),
    }
}

/// Write `pid` as text, replacing any previous content.
///
/// Missing parent directories are created.
pub fn write_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, pid.to_string())
}

/// Delete a file, treating "already gone" as success. Other failures are
/// logged and swallowed.
pub fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = ?path, "removed file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = ?path, error = %err, "failed to remove file"),
    }
}
