//! Stub trackers/seeders and helpers for inspecting real processes.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Write an executable `sh` script to `dir/name` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub script");
    let mut perms = fs::metadata(&path).expect("stat stub script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod stub script");
    path
}

/// A stand-in tracker/seeder: records its arguments to `<dir>/<name>.args`
/// (one per line) and then becomes `sleep`, keeping its pid.
pub fn write_stub_binary(dir: &Path, name: &str) -> PathBuf {
    let args_file = dir.join(format!("{name}.args"));
    write_script(
        dir,
        name,
        &format!(
            "printf '%s\\n' \"$@\" > '{}'\nexec sleep 300",
            args_file.display()
        ),
    )
}

/// Like [`write_stub_binary`] but ignores SIGTERM, so only SIGKILL stops it.
pub fn write_stubborn_binary(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "trap '' TERM\nexec sleep 300")
}

/// Signal-0 probe that treats zombies as dead.
pub fn pid_is_alive(pid: u32) -> bool {
    seedwatch::supervisor::signals::is_alive(Pid::from_raw(pid as i32))
}

/// Read a pid file written by the supervisor.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Name of the executable `pid` is currently running (Linux `/proc`).
pub fn process_name(pid: u32) -> Option<String> {
    fs::read_to_string(format!("/proc/{pid}/comm"))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Poll `cond` every 20ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until a stub script has `exec`ed into `sleep` (its traps are set).
pub async fn wait_for_sleep(pid: u32) -> bool {
    wait_until(Duration::from_secs(3), || {
        process_name(pid).as_deref() == Some("sleep")
    })
    .await
}

/// Best-effort SIGKILL for test cleanup.
pub fn force_kill(pid: u32) {
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}
