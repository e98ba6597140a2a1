//! Replay transport: a `StreamClient` that feeds recorded event files back
//! through the monitor. Production deployments plug a real wire transport
//! into the same trait; replay gives local runs and soak tests a live-like
//! upstream with no network.
//!
//! Layout: one `<target>.jsonl` file per target in the replay directory,
//! one serialized [`WireEvent`] per line. A missing file means the target
//! is not live right now.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use livepulse_common::LivePulseError;

use crate::client::{StreamClient, StreamEvent, StreamSession};

/// On-disk event representation, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Connected {
        #[serde(default)]
        viewer_count: u64,
    },
    Comment {
        author: String,
        text: String,
    },
    Disconnected,
}

impl From<WireEvent> for StreamEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Connected { viewer_count } => StreamEvent::Connected { viewer_count },
            WireEvent::Comment { author, text } => StreamEvent::Comment { author, text },
            WireEvent::Disconnected => StreamEvent::Disconnected,
        }
    }
}

pub struct ReplayClient {
    dir: PathBuf,
    /// Pause between replayed events, approximating live pacing.
    event_gap: Duration,
}

impl ReplayClient {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            event_gap: Duration::from_millis(50),
        }
    }

    pub fn with_event_gap(mut self, gap: Duration) -> Self {
        self.event_gap = gap;
        self
    }
}

#[async_trait]
impl StreamClient for ReplayClient {
    async fn connect(&self, target: &str) -> Result<Box<dyn StreamSession>> {
        let path = self.dir.join(format!("{target}.jsonl"));
        if !path.exists() {
            return Err(LivePulseError::Connection(format!(
                "target @{target} is not live (no replay file)"
            ))
            .into());
        }
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("opening replay file {}", path.display()))?;
        Ok(Box::new(ReplaySession {
            lines: BufReader::new(file).lines(),
            event_gap: self.event_gap,
            done: false,
        }))
    }
}

struct ReplaySession {
    lines: Lines<BufReader<tokio::fs::File>>,
    event_gap: Duration,
    done: bool,
}

#[async_trait]
impl StreamSession for ReplaySession {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Replay read failed, ending session");
                    self.done = true;
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WireEvent>(&line) {
                Ok(wire) => {
                    tokio::time::sleep(self.event_gap).await;
                    return Some(wire.into());
                }
                Err(e) => {
                    // One malformed line should not kill the session.
                    tracing::warn!(error = %e, "Skipping malformed replay line");
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        self.done = true;
    }
}
