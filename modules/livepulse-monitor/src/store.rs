//! File-backed snapshot store for the dedup ledger and the stats registry.
//! Load failures are warnings, never fatal: the monitor starts with empty
//! in-memory state and keeps running.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use livepulse_common::LivePulseError;

pub const DEDUP_SNAPSHOT_FILE: &str = "comment_history.json";
pub const STATS_SNAPSHOT_FILE: &str = "monitor_stats.json";

/// JSON persistence rooted at the output directory.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Result<Self, LivePulseError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| LivePulseError::Persistence(format!("creating {}: {e}", dir.display())))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), LivePulseError> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| LivePulseError::Persistence(format!("serializing {name}: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| LivePulseError::Persistence(format!("writing {}: {e}", path.display())))
    }

    /// Load a prior snapshot. Absence and corruption both yield `None`;
    /// corruption is logged so a recurring problem is visible.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read snapshot, starting empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt snapshot, starting empty");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();

        let mut value = HashMap::new();
        value.insert("k".to_string(), 7u64);
        store.save("test.json", &value).unwrap();

        let loaded: HashMap<String, u64> = store.load("test.json").unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        let loaded: Option<HashMap<String, u64>> = store.load("absent.json");
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_file_is_none_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let loaded: Option<HashMap<String, u64>> = store.load("bad.json");
        assert!(loaded.is_none());
    }
}
