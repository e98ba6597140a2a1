use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livepulse_common::{load_targets, LivePulseError, MonitorConfig};
use livepulse_monitor::orchestrator::MonitorDeps;
use livepulse_monitor::reporter::persist_snapshots;
use livepulse_monitor::store::DEDUP_SNAPSHOT_FILE;
use livepulse_monitor::{
    AdmissionGate, Deduplicator, FileSink, RateLimitState, ReplayClient, ShutdownCoordinator,
    SnapshotStore, StatsRegistry, StatusReporter, TargetMonitor,
};

#[derive(Parser, Debug)]
#[command(name = "monitor", about = "Live stream comment monitor")]
struct Args {
    /// Path to the target list file.
    #[arg(long, default_value = "targets.txt")]
    targets: PathBuf,

    /// Output directory for session files and snapshots.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Directory of recorded `<target>.jsonl` event files fed through the
    /// replay transport. Production transports implement `StreamClient`.
    #[arg(long, default_value = "replay")]
    replay_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("livepulse=info".parse()?))
        .init();

    let args = Args::parse();
    let config = MonitorConfig::from_env();

    info!("Live stream monitor starting");

    let targets = load_targets(&args.targets)?;
    if targets.is_empty() {
        return Err(LivePulseError::Validation(format!(
            "no valid targets configured, add identifiers to {}",
            args.targets.display()
        ))
        .into());
    }
    info!(count = targets.len(), targets = ?targets, "Monitoring targets");

    let store = Arc::new(SnapshotStore::new(&args.output)?);
    let dedup = match store.load(DEDUP_SNAPSHOT_FILE) {
        Some(snapshot) => {
            info!("Restored dedup ledger from snapshot");
            Deduplicator::restore(snapshot)
        }
        None => Deduplicator::new(),
    };

    let stats = Arc::new(StatsRegistry::new(Utc::now()));
    stats.set_total_targets(targets.len() as u64);

    let deps = Arc::new(MonitorDeps {
        gate: Arc::new(AdmissionGate::new(&config)),
        client: Arc::new(ReplayClient::new(&args.replay_dir)),
        sink: Arc::new(FileSink::new(&args.output)?),
        dedup: Arc::new(Mutex::new(dedup)),
        rate_limits: Arc::new(Mutex::new(RateLimitState::new())),
        stats,
        config,
    });

    let shutdown = ShutdownCoordinator::new();
    tokio::spawn(shutdown.clone().listen_for_signals());

    let mut handles = Vec::new();
    for target in targets {
        let monitor = TargetMonitor::new(target, deps.clone(), shutdown.token());
        handles.push(tokio::spawn(monitor.run()));
    }

    let reporter = StatusReporter::new(deps.clone(), store.clone(), shutdown.token());
    let reporter_handle = tokio::spawn(reporter.run());

    for handle in handles {
        let _ = handle.await;
    }
    let _ = reporter_handle.await;

    // Ordered teardown: loops have disconnected; flush state, then report.
    persist_snapshots(&deps, &store);
    info!("{}", deps.stats.snapshot());
    info!("Shutdown complete");
    Ok(())
}
