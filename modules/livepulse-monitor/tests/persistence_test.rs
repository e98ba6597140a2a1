//! Snapshot persistence across a simulated restart: the restored ledger
//! must make the same suppression decisions the live one would have.

use chrono::{Duration, Utc};

use livepulse_monitor::dedup::DedupSnapshot;
use livepulse_monitor::stats::StatsSnapshot;
use livepulse_monitor::store::{DEDUP_SNAPSHOT_FILE, STATS_SNAPSHOT_FILE};
use livepulse_monitor::{Deduplicator, SnapshotStore, StatsRegistry};

#[test]
fn ledger_survives_restart_with_identical_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path()).unwrap();
    let now = Utc::now();

    let mut dedup = Deduplicator::new();
    assert!(!dedup.should_suppress("t", "u1", "seen before", now));
    assert!(!dedup.should_suppress("t", "u2", "also seen", now));
    store.save(DEDUP_SNAPSHOT_FILE, &dedup.snapshot(now)).unwrap();

    // "Restart": reload from disk and replay the same inputs.
    let snapshot: DedupSnapshot = store.load(DEDUP_SNAPSHOT_FILE).unwrap();
    let mut restored = Deduplicator::restore(snapshot);

    let later = now + Duration::seconds(3);
    assert!(restored.should_suppress("t", "u1", "seen before", later));
    assert!(restored.should_suppress("t", "u2", "also seen", later));
    assert!(!restored.should_suppress("t", "u3", "brand new", later));
}

#[test]
fn stats_snapshot_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path()).unwrap();

    let stats = StatsRegistry::new(Utc::now());
    stats.set_total_targets(4);
    stats.record_attempt();
    stats.record_comment(Utc::now());
    store.save(STATS_SNAPSHOT_FILE, &stats.snapshot()).unwrap();

    let loaded: StatsSnapshot = store.load(STATS_SNAPSHOT_FILE).unwrap();
    assert_eq!(loaded.total_targets, 4);
    assert_eq!(loaded.connection_attempts, 1);
    assert_eq!(loaded.comments_captured, 1);
}

#[test]
fn corrupt_ledger_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path()).unwrap();
    std::fs::write(dir.path().join(DEDUP_SNAPSHOT_FILE), "{broken").unwrap();

    let snapshot: Option<DedupSnapshot> = store.load(DEDUP_SNAPSHOT_FILE);
    assert!(snapshot.is_none());

    // A fresh deduplicator accepts everything the first time.
    let mut dedup = Deduplicator::new();
    assert!(!dedup.should_suppress("t", "u1", "anything", Utc::now()));
}
