// src/supervisor/mod.rs

//! Start/stop protocol for a single child process identified by a pid file.
//!
//! - [`pid_file`] reads, writes and removes pid files.
//! - [`signals`] wraps `kill(2)` (liveness probe, SIGTERM, SIGKILL).
//! - [`process`] holds the [`ManagedProcess`] value type.
//!
//! Stopping escalates: SIGTERM, then up to [`GRACE_PERIOD`] for the process
//! to exit, then SIGKILL. The wait ends early on the child's exit
//! notification when this daemon spawned the process, and on a
//! [`POLL_INTERVAL`] liveness probe when it was adopted from a pid file.

pub mod pid_file;
pub mod process;
pub mod signals;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::anyhow;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SeedwatchError};
use crate::types::Role;

pub use pid_file::{read_pid_file, remove_if_present, write_pid_file, PidFileState};
pub use process::ManagedProcess;
use signals::Delivery;

/// How long a process gets to exit after SIGTERM.
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Liveness probe interval for processes we hold no handle for.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Program and arguments of a child to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// How `stop` found and left the process. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NoPidFile,
    InvalidPidFile,
    NotRunning,
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
    /// The process exists but we may not signal it.
    SignalDenied,
}

#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    grace_period: Duration,
    poll_interval: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            grace_period: GRACE_PERIOD,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Make sure the process recorded in `process`'s pid file is no longer
    /// running, then remove the pid file.
    ///
    /// Never fails: a missing or corrupt pid file, an already-dead process
    /// and a refused signal all leave the caller free to start a replacement.
    pub async fn stop(&self, process: ManagedProcess) -> StopOutcome {
        let (role, pid_file, child) = process.into_parts();

        let pid = match read_pid_file(&pid_file) {
            PidFileState::Missing => {
                debug!(%role, pid_file = ?pid_file, "nothing to stop");
                return StopOutcome::NoPidFile;
            }
            PidFileState::Invalid(contents) => {
                warn!(
                    %role,
                    pid_file = ?pid_file,
                    contents = %contents.trim(),
                    "pid file does not contain a pid; discarding it"
                );
                remove_if_present(&pid_file);
                return StopOutcome::InvalidPidFile;
            }
            PidFileState::Pid(pid) => pid,
        };

        // The handle is only authoritative if it is the process the file names.
        let mut child = child.filter(|c| c.id() == u32::try_from(pid.as_raw()).ok());

        let outcome = self.terminate(role, pid, child.as_mut()).await;
        remove_if_present(&pid_file);
        outcome
    }

    async fn terminate(&self, role: Role, pid: Pid, mut child: Option<&mut Child>) -> StopOutcome {
        let alive = match child.as_deref_mut() {
            Some(c) => child_running(c.try_wait(), pid),
            None => signals::is_alive(pid),
        };
        if !alive {
            debug!(%role, %pid, "recorded process is not running");
            return StopOutcome::NotRunning;
        }

        match signals::send(pid, Signal::SIGTERM) {
            Delivery::Delivered => {
                debug!(%role, %pid, "sent SIGTERM");
            }
            Delivery::NoSuchProcess => {
                debug!(%role, %pid, "process exited before SIGTERM");
                return StopOutcome::NotRunning;
            }
            Delivery::Denied(errno) => {
                warn!(%role, %pid, error = %errno, "not permitted to signal process; leaving it");
                return StopOutcome::SignalDenied;
            }
        }

        if self.exited_within(pid, child.as_deref_mut(), self.grace_period).await {
            info!(%role, %pid, "process terminated");
            return StopOutcome::Terminated;
        }

        warn!(
            %role,
            %pid,
            grace_ms = self.grace_period.as_millis() as u64,
            "process ignored SIGTERM; sending SIGKILL"
        );
        match signals::send(pid, Signal::SIGKILL) {
            Delivery::Delivered => {}
            Delivery::NoSuchProcess => return StopOutcome::Terminated,
            Delivery::Denied(errno) => {
                warn!(%role, %pid, error = %errno, "SIGKILL refused");
                return StopOutcome::SignalDenied;
            }
        }

        // SIGKILL cannot be ignored, but delivery is asynchronous.
        if !self.exited_within(pid, child, self.grace_period).await {
            warn!(%role, %pid, "process still present after SIGKILL");
        }
        info!(%role, %pid, "process killed");
        StopOutcome::Killed
    }

    /// Wait at most `limit` for `pid` to go away.
    async fn exited_within(&self, pid: Pid, child: Option<&mut Child>, limit: Duration) -> bool {
        let poll_interval = self.poll_interval;
        let exit = async move {
            if let Some(child) = child {
                match child.wait().await {
                    Ok(status) => {
                        debug!(%pid, ?status, "child exited");
                        return;
                    }
                    Err(err) => {
                        warn!(%pid, error = %err, "waiting on child failed; polling instead");
                    }
                }
            }

            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !signals::is_alive(pid) {
                    return;
                }
            }
        };

        timeout(limit, exit).await.is_ok()
    }

    /// Launch `launch` detached from the daemon and record its pid in
    /// `pid_file`.
    ///
    /// The child gets its own process group and is not killed when the daemon
    /// exits, so it keeps serving across daemon restarts. If the pid file
    /// cannot be written the child is killed again, since nothing could ever
    /// find it to stop it.
    pub async fn start(&self, role: Role, launch: &LaunchSpec, pid_file: &Path) -> Result<ManagedProcess> {
        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .process_group(0);

        let mut child = cmd.spawn().map_err(|source| SeedwatchError::Spawn {
            role,
            program: launch.program.clone(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| anyhow!("{role} exited before its pid could be read"))?;

        if let Err(source) = write_pid_file(pid_file, pid) {
            error!(
                %role,
                pid,
                pid_file = ?pid_file,
                error = %source,
                "could not record pid; killing untracked process"
            );
            if let Err(err) = child.start_kill() {
                warn!(%role, pid, error = %err, "failed to kill untracked process");
            }
            let _ = timeout(self.grace_period, child.wait()).await;
            return Err(SeedwatchError::PidFileWrite {
                path: pid_file.to_path_buf(),
                source,
            });
        }

        info!(
            %role,
            pid,
            program = ?launch.program,
            pid_file = ?pid_file,
            "started process"
        );
        Ok(ManagedProcess::spawned(role, pid_file.to_path_buf(), child))
    }
}

/// Liveness of a held child from its `try_wait` result. If the status cannot
/// be collected, fall back to probing the pid.
fn child_running(status: std::io::Result<Option<ExitStatus>>, pid: Pid) -> bool {
    match status {
        Ok(None) => true,
        Ok(Some(_)) => false,
        Err(err) => {
            warn!(%pid, error = %err, "could not poll child status; probing pid");
            signals::is_alive(pid)
        }
    }
}
