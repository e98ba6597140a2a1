//! Event sink seam plus the default file-backed implementation.
//!
//! The file sink writes one session file per target, created lazily on the
//! first record: comment lines carry just the cleaned text, system notices
//! get a `SYSTEM:` prefix so sessions can be reconstructed later by the
//! offline analyzer.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use livepulse_common::{EventKind, LivePulseError, SinkRecord};

/// Anything that durably accepts events the monitor decided to keep.
/// At-most-once: the monitor suppresses duplicates before calling this,
/// and repeated calls for the same target must be safe.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, record: &SinkRecord) -> Result<(), LivePulseError>;
}

/// Per-target session files under one output directory.
pub struct FileSink {
    output_dir: PathBuf,
    session_files: Mutex<HashMap<String, PathBuf>>,
}

impl FileSink {
    pub fn new(output_dir: &Path) -> Result<Self, LivePulseError> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            LivePulseError::Persistence(format!("creating {}: {e}", output_dir.display()))
        })?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            session_files: Mutex::new(HashMap::new()),
        })
    }

    fn session_filename(target: &str, now: DateTime<Utc>) -> String {
        format!("livepulse-{target}-{}.txt", now.format("%Y%m%d_%H%M%S"))
    }

    fn append(path: &Path, line: &str) -> Result<(), LivePulseError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LivePulseError::Persistence(format!("opening {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| LivePulseError::Persistence(format!("writing {}: {e}", path.display())))
    }
}

#[async_trait]
impl EventSink for FileSink {
    async fn record(&self, record: &SinkRecord) -> Result<(), LivePulseError> {
        let mut sessions = self.session_files.lock().await;
        let path = match sessions.get(&record.target) {
            Some(path) => path.clone(),
            None => {
                let path = self
                    .output_dir
                    .join(Self::session_filename(&record.target, record.timestamp));
                Self::append(&path, &format!("SYSTEM: Session opened for @{}", record.target))?;
                sessions.insert(record.target.clone(), path.clone());
                path
            }
        };

        // Session files are line-oriented; collapse embedded line breaks.
        let clean: String = record.text.replace(['\n', '\r'], " ").trim().to_string();

        match record.kind {
            EventKind::Comment => Self::append(&path, &clean),
            EventKind::System => Self::append(&path, &format!("SYSTEM: {clean}")),
        }
    }
}
