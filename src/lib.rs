// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod reconcile;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::reconcile::{
    ChildCommands, HostResolver, Reconcile, RepositoryReconciler, StaticHostResolver,
    SystemHostResolver,
};
use crate::supervisor::ProcessSupervisor;
use crate::types::Role;
use crate::watch::{FatalError, WatchOptions, WatchRouter, WatcherGroup};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - one reconciler per repository
/// - the router and the per-repository watch loops
/// - SIGINT / SIGTERM handling
///
/// Returns `Ok` on a shutdown signal and `Err` only for a fatal error. A
/// repository whose watch cannot be started is logged and skipped, even if
/// that leaves nothing to watch. Supervised trackers and seeders are left
/// running; the next daemon adopts them through their pid files.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    let commands = Arc::new(ChildCommands {
        tracker_bin: args.tracker_bin.clone(),
        seeder_bin: args.seeder_bin.clone(),
    });

    if args.dry_run {
        print_dry_run(&cfg, &commands, args.advertise_address);
        return Ok(());
    }

    let resolver: Arc<dyn HostResolver> = match args.advertise_address {
        Some(addr) => Arc::new(StaticHostResolver(addr)),
        None => Arc::new(SystemHostResolver),
    };

    // Fail before watching anything if peers could never reach us.
    let address = resolver.resolve().await?;
    info!(%address, "advertising host address to peers");

    let router = Arc::new(WatchRouter::from_config(&cfg));
    let reconcilers = build_reconcilers(&cfg, ProcessSupervisor::new(), commands, resolver);

    let options = WatchOptions {
        policy: args.on_change,
        reconcile_on_start: args.reconcile_on_start,
    };

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<FatalError>();
    let group = WatcherGroup::spawn(router, reconcilers, options, fatal_tx);

    if group.is_empty() {
        error!(
            failed = ?group.failed(),
            "no watch loop could be started; waiting for a shutdown signal"
        );
    }
    debug!(?group, "daemon running");

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown requested; supervised processes keep running");
            Ok(())
        }
        Some(fatal) = fatal_rx.recv() => {
            error!(error = %fatal, "stopping daemon");
            Err(fatal.into())
        }
    }
}

/// One reconciler per configured repository, all sharing the supervisor
/// settings, executables and address source.
pub fn build_reconcilers(
    cfg: &ConfigFile,
    supervisor: ProcessSupervisor,
    commands: Arc<ChildCommands>,
    resolver: Arc<dyn HostResolver>,
) -> Vec<RepositoryReconciler> {
    cfg.repositories()
        .map(|repo| {
            RepositoryReconciler::new(
                Arc::clone(repo),
                supervisor.clone(),
                Arc::clone(&commands),
                Arc::clone(&resolver),
            )
        })
        .inspect(|r| debug!(repo = %r.repository(), "reconciler ready"))
        .collect()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Simple dry-run output: repositories, derived files and commands.
fn print_dry_run(cfg: &ConfigFile, commands: &ChildCommands, address: Option<IpAddr>) {
    println!("seedwatch dry-run");
    println!("  tracker_bin = {}", commands.tracker_bin.display());
    println!("  seeder_bin = {}", commands.seeder_bin.display());
    println!();

    println!("repositories ({}):", cfg.len());
    for repo in cfg.repositories() {
        println!("  - {}", repo.name);
        println!("      torrent: {}", repo.torrent.display());
        println!("      seed_location: {}", repo.seed_location.display());
        println!("      tracker_port: {}", repo.tracker_port);
        println!("      tracker pid file: {}", repo.pid_file(Role::Tracker).display());
        println!("      seeder pid file: {}", repo.pid_file(Role::Seeder).display());
        println!("      tracker state: {}", repo.tracker_state_file().display());
        if repo.use_hash {
            println!("      use_hash: true");
        }

        let tracker = commands.tracker(repo);
        println!("      tracker cmd: {} {:?}", tracker.program.display(), tracker.args);
        if let Some(addr) = address {
            let seeder = commands.seeder(repo, addr);
            println!("      seeder cmd: {} {:?}", seeder.program.display(), seeder.args);
        }
    }

    debug!("dry-run complete (no processes touched)");
}
