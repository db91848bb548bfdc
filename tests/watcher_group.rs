// tests/watcher_group.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, RepositoryBuilder};
use crate::common::processes::{force_kill, pid_is_alive, read_pid, wait_until, write_stub_binary};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use seedwatch::build_reconcilers;
use seedwatch::config::ConfigFile;
use seedwatch::reconcile::{ChildCommands, StaticHostResolver};
use seedwatch::supervisor::ProcessSupervisor;
use seedwatch::types::{ChangePolicy, Role};
use seedwatch::watch::{FatalError, WatchOptions, WatchRouter, WatcherGroup};
use seedwatch_test_utils::fake_reconciler::FakeReconciler;

type TestResult = Result<(), Box<dyn Error>>;

/// Give inotify time to register the watches before touching files.
const SETTLE: Duration = Duration::from_millis(200);

fn two_repos(root: &Path) -> ConfigFile {
    ConfigFileBuilder::new()
        .with_repository("A", RepositoryBuilder::new(root, "A", 7001).build())
        .with_repository("AB", RepositoryBuilder::new(root, "AB", 7002).build())
        .build()
}

fn fakes(
    cfg: &ConfigFile,
    invoked: &Arc<Mutex<Vec<String>>>,
    tx: &mpsc::UnboundedSender<String>,
) -> Vec<FakeReconciler> {
    cfg.repositories()
        .map(|r| FakeReconciler::new(&r.name, Arc::clone(invoked)).notifying(tx.clone()))
        .collect()
}

fn invocations(invoked: &Arc<Mutex<Vec<String>>>, repository: &str) -> usize {
    invoked.lock().unwrap().iter().filter(|r| *r == repository).count()
}

#[tokio::test]
async fn writing_a_torrent_triggers_only_its_repository() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = two_repos(dir.path());
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let group = WatcherGroup::spawn(
        router,
        fakes(&cfg, &invoked, &tx),
        WatchOptions {
            policy: ChangePolicy::Queue,
            reconcile_on_start: false,
        },
        fatal_tx,
    );
    assert_eq!(group.len(), 2);
    assert!(group.failed().is_empty());
    sleep(SETTLE).await;

    fs::write(dir.path().join("AB.torrent"), "ab")?;
    let first = with_timeout(rx.recv()).await.expect("notification");
    assert_eq!(first, "AB");

    // Let any straggling events for AB drain, then make sure A never ran.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(invocations(&invoked, "A"), 0);
    while rx.try_recv().is_ok() {}

    fs::write(dir.path().join("A.torrent"), "a")?;
    let next = with_timeout(rx.recv()).await.expect("notification");
    assert_eq!(next, "A");

    // Unrelated files in the watched directory are ignored.
    sleep(Duration::from_millis(300)).await;
    let before = invoked.lock().unwrap().len();
    fs::write(dir.path().join("A.torrent.tmp"), "partial")?;
    fs::write(dir.path().join("notes.txt"), "hello")?;
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        invoked.lock().unwrap().len(),
        before,
        "unrelated files caused reconciliations"
    );

    drop(group);
    Ok(())
}

#[tokio::test]
async fn rename_into_place_triggers_reconcile() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = two_repos(dir.path());
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let _group = WatcherGroup::spawn(router, fakes(&cfg, &invoked, &tx), WatchOptions::default(), fatal_tx);
    sleep(SETTLE).await;

    let staging = dir.path().join(".A.torrent.partial");
    fs::write(&staging, "new torrent")?;
    fs::rename(&staging, dir.path().join("A.torrent"))?;

    let got = with_timeout(rx.recv()).await.expect("notification");
    assert_eq!(got, "A");
    Ok(())
}

#[tokio::test]
async fn fatal_error_is_reported_and_stops_the_loop() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_repository("A", RepositoryBuilder::new(dir.path(), "A", 7001).build())
        .build();
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let reconciler = FakeReconciler::new("A", Arc::clone(&invoked)).failing_fatally();
    let group = WatcherGroup::spawn(router, vec![reconciler], WatchOptions::default(), fatal_tx);
    sleep(SETTLE).await;

    fs::write(dir.path().join("A.torrent"), "a")?;

    let fatal = with_timeout(fatal_rx.recv()).await.expect("fatal error");
    assert_eq!(fatal.repository, "A");
    assert!(fatal.error.is_fatal());
    assert!(fatal.to_string().contains("repository 'A'"));

    assert!(wait_until(Duration::from_secs(2), || group.any_finished()).await);

    // A stopped loop reconciles nothing more.
    let count = invocations(&invoked, "A");
    fs::write(dir.path().join("A.torrent"), "again")?;
    sleep(Duration::from_millis(300)).await;
    assert_eq!(invocations(&invoked, "A"), count);
    Ok(())
}

#[tokio::test]
async fn missing_directory_fails_only_that_repository() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_repository("A", RepositoryBuilder::new(dir.path(), "A", 7001).build())
        .with_repository(
            "ghost",
            RepositoryBuilder::new(dir.path(), "ghost", 7002)
                .torrent(dir.path().join("does-not-exist").join("ghost.torrent"))
                .build(),
        )
        .build();
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let group = WatcherGroup::spawn(router, fakes(&cfg, &invoked, &tx), WatchOptions::default(), fatal_tx);

    assert_eq!(group.repositories(), vec!["A"]);
    assert_eq!(group.failed(), ["ghost".to_string()]);
    sleep(SETTLE).await;

    fs::write(dir.path().join("A.torrent"), "a")?;
    assert_eq!(with_timeout(rx.recv()).await.as_deref(), Some("A"));
    Ok(())
}

#[tokio::test]
async fn reconcile_on_start_runs_for_existing_torrents_only() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = two_repos(dir.path());
    fs::write(dir.path().join("A.torrent"), "present at startup")?;

    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let _group = WatcherGroup::spawn(
        router,
        fakes(&cfg, &invoked, &tx),
        WatchOptions {
            policy: ChangePolicy::Coalesce,
            reconcile_on_start: true,
        },
        fatal_tx,
    );

    assert_eq!(with_timeout(rx.recv()).await.as_deref(), Some("A"));
    sleep(Duration::from_millis(200)).await;
    assert_eq!(invocations(&invoked, "AB"), 0);
    Ok(())
}

#[tokio::test]
async fn slow_reconcile_does_not_block_other_repositories() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = two_repos(dir.path());
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    // A sits in a redeploy longer than a full stop grace period.
    let reconcilers = vec![
        FakeReconciler::new("A", Arc::clone(&invoked))
            .notifying(tx.clone())
            .with_delay(Duration::from_secs(3)),
        FakeReconciler::new("AB", Arc::clone(&invoked)).notifying(tx),
    ];
    let _group = WatcherGroup::spawn(router, reconcilers, WatchOptions::default(), fatal_tx);
    sleep(SETTLE).await;

    fs::write(dir.path().join("A.torrent"), "a")?;
    assert!(
        wait_until(Duration::from_secs(2), || invocations(&invoked, "A") > 0).await,
        "A never started reconciling"
    );

    fs::write(dir.path().join("AB.torrent"), "ab")?;
    let got = timeout(Duration::from_secs(1), rx.recv()).await?;
    assert_eq!(got.as_deref(), Some("AB"));
    Ok(())
}

#[tokio::test]
async fn coalesce_collapses_a_burst_of_writes() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_repository("A", RepositoryBuilder::new(dir.path(), "A", 7001).build())
        .build();
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let invoked = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel::<FatalError>();

    let reconciler = FakeReconciler::new("A", Arc::clone(&invoked))
        .notifying(tx)
        .with_delay(Duration::from_millis(400));
    let _group = WatcherGroup::spawn(
        router,
        vec![reconciler],
        WatchOptions {
            policy: ChangePolicy::Coalesce,
            reconcile_on_start: false,
        },
        fatal_tx,
    );
    sleep(SETTLE).await;

    let torrent = dir.path().join("A.torrent");
    for i in 0..10 {
        fs::write(&torrent, format!("revision {i}"))?;
        sleep(Duration::from_millis(10)).await;
    }

    with_timeout(rx.recv()).await.expect("first reconcile");
    // Whatever arrived during the first run is handled by at most one more.
    while let Ok(Some(_)) = timeout(Duration::from_millis(1000), rx.recv()).await {}

    let runs = invocations(&invoked, "A");
    assert!(
        (1..=2).contains(&runs),
        "expected the burst to coalesce, got {runs} reconciliations"
    );
    Ok(())
}

#[tokio::test]
async fn torrent_change_redeploys_real_processes() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin)?;
    let commands = Arc::new(ChildCommands {
        tracker_bin: write_stub_binary(&bin, "bttrack"),
        seeder_bin: write_stub_binary(&bin, "murder_client"),
    });

    let cfg = ConfigFileBuilder::new()
        .with_repository("repo1", RepositoryBuilder::new(dir.path(), "repo1", 6969).build())
        .build();
    let repo = Arc::clone(cfg.get("repo1").expect("repo1"));
    fs::create_dir_all(&repo.run_location)?;
    fs::write(repo.tracker_state_file(), "old state")?;

    let reconcilers = build_reconcilers(
        &cfg,
        ProcessSupervisor::new().with_grace_period(Duration::from_millis(500)),
        commands,
        Arc::new(StaticHostResolver(IpAddr::V4(Ipv4Addr::LOCALHOST))),
    );
    let router = Arc::new(WatchRouter::from_config(&cfg));
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<FatalError>();
    let group = WatcherGroup::spawn(router, reconcilers, WatchOptions::default(), fatal_tx);
    sleep(SETTLE).await;

    fs::write(&repo.torrent, "d8:announce0:e")?;

    let tracker_file = repo.pid_file(Role::Tracker);
    let seeder_file = repo.pid_file(Role::Seeder);
    assert!(
        wait_until(Duration::from_secs(5), || tracker_file.exists() && seeder_file.exists()).await,
        "pid files never appeared"
    );
    assert!(!repo.tracker_state_file().exists());

    // Let trailing events from the first write play out.
    sleep(Duration::from_millis(800)).await;
    let tracker = read_pid(&tracker_file).expect("tracker pid");
    let seeder = read_pid(&seeder_file).expect("seeder pid");
    assert!(pid_is_alive(tracker));
    assert!(pid_is_alive(seeder));
    assert!(fatal_rx.try_recv().is_err());

    fs::write(&repo.torrent, "d8:announce3:newe")?;
    assert!(
        wait_until(Duration::from_secs(5), || {
            read_pid(&tracker_file).is_some_and(|p| p != tracker)
        })
        .await,
        "tracker was not replaced"
    );
    assert!(wait_until(Duration::from_secs(2), || !pid_is_alive(tracker)).await);

    drop(group);
    sleep(Duration::from_millis(200)).await;
    for file in [&tracker_file, &seeder_file] {
        if let Some(pid) = read_pid(file) {
            force_kill(pid);
        }
    }
    Ok(())
}
