// src/supervisor/signals.rs

//! Thin wrappers over `kill(2)`.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Result of delivering a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NoSuchProcess,
    Denied(Errno),
}

pub fn send(pid: Pid, signal: Signal) -> Delivery {
    match kill(pid, signal) {
        Ok(()) => Delivery::Delivered,
        Err(Errno::ESRCH) => Delivery::NoSuchProcess,
        Err(errno) => Delivery::Denied(errno),
    }
}

/// Signal-0 liveness probe.
///
/// `EPERM` means the process exists but belongs to someone else, so it counts
/// as alive. A zombie has already exited and only waits to be reaped, so it
/// counts as gone.
pub fn is_alive(pid: Pid) -> bool {
    match kill(pid, None::<Signal>) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: Pid) -> bool {
    // Format: `pid (comm) state ...`; comm may itself contain ") ".
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    stat.rfind(')')
        .and_then(|idx| stat[idx + 1..].trim_start().chars().next())
        .is_some_and(|state| state == 'Z')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: Pid) -> bool {
    false
}
