use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a sink record represents: a captured viewer comment, or a
/// connection-lifecycle notice emitted by the monitor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    System,
    Comment,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Comment => "comment",
        }
    }
}

/// One event accepted for persistence, already past deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkRecord {
    pub target: String,
    pub kind: EventKind,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
