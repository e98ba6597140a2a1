//! Aggregate monitoring counters, incremented by every monitor loop and
//! read by the status reporter. Counters are atomics; the snapshot is a
//! plain serializable struct written alongside the dedup ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct StatsRegistry {
    total_targets: AtomicU64,
    active_connections: AtomicU64,
    connection_attempts: AtomicU64,
    failed_connections: AtomicU64,
    rate_limit_hits: AtomicU64,
    duplicates_filtered: AtomicU64,
    comments_captured: AtomicU64,
    start_time: DateTime<Utc>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl StatsRegistry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_targets: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            connection_attempts: AtomicU64::new(0),
            failed_connections: AtomicU64::new(0),
            rate_limit_hits: AtomicU64::new(0),
            duplicates_filtered: AtomicU64::new(0),
            comments_captured: AtomicU64::new(0),
            start_time: now,
            last_update: Mutex::new(None),
        }
    }

    pub fn set_total_targets(&self, count: u64) {
        self.total_targets.store(count, Ordering::Relaxed);
    }

    pub fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_comment(&self, now: DateTime<Utc>) {
        self.comments_captured.fetch_add(1, Ordering::Relaxed);
        *self
            .last_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(now);
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturating: a stray disconnect signal must not wrap the gauge.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_targets: self.total_targets.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            duplicates_filtered: self.duplicates_filtered.load(Ordering::Relaxed),
            comments_captured: self.comments_captured.load(Ordering::Relaxed),
            start_time: self.start_time,
            last_update: *self
                .last_update
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }

    pub fn runtime_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }
}

/// Point-in-time view of the registry, serialized to `monitor_stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_targets: u64,
    pub active_connections: u64,
    pub connection_attempts: u64,
    pub failed_connections: u64,
    pub rate_limit_hits: u64,
    pub duplicates_filtered: u64,
    pub comments_captured: u64,
    pub start_time: DateTime<Utc>,
    pub last_update: Option<DateTime<Utc>>,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Monitor Run Complete ===")?;
        writeln!(f, "Comments captured:   {}", self.comments_captured)?;
        writeln!(f, "Duplicates filtered: {}", self.duplicates_filtered)?;
        writeln!(f, "Rate limit hits:     {}", self.rate_limit_hits)?;
        writeln!(f, "Connection attempts: {}", self.connection_attempts)?;
        writeln!(f, "Failed connections:  {}", self.failed_connections)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StatsRegistry::new(Utc::now());
        stats.record_attempt();
        stats.record_attempt();
        stats.record_failure();
        stats.record_rate_limit_hit();
        stats.record_duplicate();
        stats.record_comment(Utc::now());

        let snap = stats.snapshot();
        assert_eq!(snap.connection_attempts, 2);
        assert_eq!(snap.failed_connections, 1);
        assert_eq!(snap.rate_limit_hits, 1);
        assert_eq!(snap.duplicates_filtered, 1);
        assert_eq!(snap.comments_captured, 1);
        assert!(snap.last_update.is_some());
    }

    #[test]
    fn active_connections_never_wrap() {
        let stats = StatsRegistry::new(Utc::now());
        stats.connection_closed();
        assert_eq!(stats.snapshot().active_connections, 0);

        stats.connection_opened();
        stats.connection_closed();
        stats.connection_closed();
        assert_eq!(stats.snapshot().active_connections, 0);
    }
}
