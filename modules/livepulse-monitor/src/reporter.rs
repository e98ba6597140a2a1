//! Periodic status reporting and snapshot maintenance: one summary line per
//! interval, plus dedup-ledger and stats persistence. Persistence failures
//! are logged and swallowed; the reporter never terminates the process.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::MonitorDeps;
use crate::store::{SnapshotStore, DEDUP_SNAPSHOT_FILE, STATS_SNAPSHOT_FILE};

pub struct StatusReporter {
    deps: Arc<MonitorDeps>,
    store: Arc<SnapshotStore>,
    cancel: CancellationToken,
}

impl StatusReporter {
    pub fn new(deps: Arc<MonitorDeps>, store: Arc<SnapshotStore>, cancel: CancellationToken) -> Self {
        Self { deps, store, cancel }
    }

    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = sleep(self.deps.config.report_interval()) => {}
                _ = self.cancel.cancelled() => break,
            }
            self.report();
            persist_snapshots(&self.deps, &self.store);
        }
    }

    fn report(&self) {
        let now = Utc::now();
        let stats = self.deps.stats.snapshot();

        let (limited_targets, global_remaining) = {
            let limits = self
                .deps
                .rate_limits
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (
                limits.limited_target_count(now),
                limits.global_remaining_secs(now),
            )
        };

        info!(
            active = stats.active_connections,
            total = stats.total_targets,
            comments = stats.comments_captured,
            duplicates_filtered = stats.duplicates_filtered,
            rate_limit_hits = stats.rate_limit_hits,
            runtime_secs = self.deps.stats.runtime_secs(now),
            "Status"
        );

        if global_remaining > 0 {
            info!(remaining_secs = global_remaining, "Global rate limit active");
        }
        if limited_targets > 0 {
            info!(count = limited_targets, "Targets currently rate limited");
        }
    }
}

/// Write the dedup ledger and stats snapshots. Shared by the reporter loop
/// and the shutdown path.
pub fn persist_snapshots(deps: &MonitorDeps, store: &SnapshotStore) {
    let now = Utc::now();

    let ledger = deps
        .dedup
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .snapshot(now);
    if let Err(e) = store.save(DEDUP_SNAPSHOT_FILE, &ledger) {
        warn!(error = %e, "Failed to persist dedup ledger");
    }

    if let Err(e) = store.save(STATS_SNAPSHOT_FILE, &deps.stats.snapshot()) {
        warn!(error = %e, "Failed to persist stats");
    }
}
