// tests/supervisor_start.rs

mod common;
use crate::common::processes::{
    force_kill, pid_is_alive, read_pid, wait_until, write_script, write_stub_binary,
};
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use seedwatch::errors::SeedwatchError;
use seedwatch::supervisor::{LaunchSpec, ProcessSupervisor};
use seedwatch::types::Role;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn start_records_pid_of_running_child() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let stub = write_stub_binary(dir.path(), "tracker");
    let pid_file = dir.path().join("tracker_6969.pid");

    let process = ProcessSupervisor::new()
        .start(Role::Tracker, &LaunchSpec::new(&stub), &pid_file)
        .await?;
    let pid = process.pid().expect("pid");

    assert_eq!(process.role(), Role::Tracker);
    assert_eq!(process.pid_file(), pid_file.as_path());
    assert_eq!(read_pid(&pid_file), Some(pid));
    assert!(pid_is_alive(pid));

    force_kill(pid);
    Ok(())
}

#[tokio::test]
async fn start_overwrites_previous_pid_file() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let stub = write_stub_binary(dir.path(), "seeder");
    let pid_file = dir.path().join("seeder_6969.pid");
    fs::write(&pid_file, "999999999\nleftover")?;

    let process = ProcessSupervisor::new()
        .start(Role::Seeder, &LaunchSpec::new(&stub), &pid_file)
        .await?;
    let pid = process.pid().expect("pid");

    assert_eq!(fs::read_to_string(&pid_file)?.trim(), pid.to_string());

    force_kill(pid);
    Ok(())
}

#[tokio::test]
async fn start_creates_missing_run_location() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let stub = write_stub_binary(dir.path(), "tracker");
    let pid_file = dir.path().join("run").join("nested").join("tracker_1.pid");

    let process = ProcessSupervisor::new()
        .start(Role::Tracker, &LaunchSpec::new(&stub), &pid_file)
        .await?;
    let pid = process.pid().expect("pid");

    assert_eq!(read_pid(&pid_file), Some(pid));

    force_kill(pid);
    Ok(())
}

#[tokio::test]
async fn start_passes_arguments_through() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let stub = write_stub_binary(dir.path(), "seeder");
    let pid_file = dir.path().join("seeder_6969.pid");
    let args_file = dir.path().join("seeder.args");

    let launch = LaunchSpec::new(&stub)
        .arg("seed")
        .arg("/srv/repo1.torrent")
        .arg("/srv/with space")
        .arg("10.0.0.1");

    let process = ProcessSupervisor::new()
        .start(Role::Seeder, &launch, &pid_file)
        .await?;
    let pid = process.pid().expect("pid");

    assert!(wait_until(Duration::from_secs(3), || args_file.exists()).await);
    let recorded = fs::read_to_string(&args_file)?;
    let args: Vec<&str> = recorded.lines().collect();
    assert_eq!(args, ["seed", "/srv/repo1.torrent", "/srv/with space", "10.0.0.1"]);

    force_kill(pid);
    Ok(())
}

#[tokio::test]
async fn missing_executable_is_a_spawn_error() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let pid_file = dir.path().join("tracker_6969.pid");

    let err = ProcessSupervisor::new()
        .start(
            Role::Tracker,
            &LaunchSpec::new(dir.path().join("no-such-bttrack")),
            &pid_file,
        )
        .await
        .expect_err("spawning a missing program must fail");

    match &err {
        SeedwatchError::Spawn { role, program, .. } => {
            assert_eq!(*role, Role::Tracker);
            assert!(program.ends_with("no-such-bttrack"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_fatal());
    assert!(!pid_file.exists());
    Ok(())
}

#[tokio::test]
async fn unwritable_pid_file_kills_the_child() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let self_pid = dir.path().join("self.pid");
    let stub = write_script(
        dir.path(),
        "tracker",
        &format!("echo $$ > '{}'\nexec sleep 300", self_pid.display()),
    );

    // The pid file's parent is a regular file, so it can never be created.
    let blocker = dir.path().join("run");
    fs::write(&blocker, "not a directory")?;
    let pid_file = blocker.join("tracker_6969.pid");

    let err = ProcessSupervisor::new()
        .with_grace_period(Duration::from_millis(500))
        .start(Role::Tracker, &LaunchSpec::new(&stub), &pid_file)
        .await
        .expect_err("pid file cannot be written");

    assert!(
        matches!(err, SeedwatchError::PidFileWrite { ref path, .. } if path == &pid_file),
        "unexpected error: {err}"
    );
    assert!(!err.is_fatal());

    // The stub may have been killed before it ran at all.
    if let Some(pid) = read_pid(&self_pid) {
        assert!(!pid_is_alive(pid), "untracked child {pid} left running");
    }
    Ok(())
}
