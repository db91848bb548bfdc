// src/supervisor/process.rs

use std::path::{Path, PathBuf};

use tokio::process::Child;

use crate::types::Role;

/// A tracker or seeder the daemon is responsible for.
///
/// The pid file is the durable identity of the process: it survives daemon
/// restarts, so a process can always be adopted from its file alone. When this
/// daemon instance spawned the process it also keeps the live `Child`, which
/// lets `stop` wait on the exit instead of polling and reaps the child.
#[derive(Debug)]
pub struct ManagedProcess {
    role: Role,
    pid_file: PathBuf,
    child: Option<Child>,
}

impl ManagedProcess {
    /// A process known only through its pid file (possibly started by an
    /// earlier daemon, possibly not running at all).
    pub fn adopt(role: Role, pid_file: impl Into<PathBuf>) -> Self {
        Self {
            role,
            pid_file: pid_file.into(),
            child: None,
        }
    }

    pub(crate) fn spawned(role: Role, pid_file: PathBuf, child: Child) -> Self {
        Self {
            role,
            pid_file,
            child: Some(child),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Pid of the held child, if any and if it has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn has_handle(&self) -> bool {
        self.child.is_some()
    }

    pub(crate) fn into_parts(self) -> (Role, PathBuf, Option<Child>) {
        (self.role, self.pid_file, self.child)
    }
}
