//! External live-stream client seam.
//!
//! The monitor never talks to a concrete upstream directly; it drives this
//! trait, which makes every orchestrator path testable with a scripted
//! in-memory client. A real transport implements `StreamClient` and yields
//! the closed `StreamEvent` set, consumed by exhaustive match in the
//! monitor loop.

use anyhow::Result;
use async_trait::async_trait;

/// Typed events a live session can produce. Closed set on purpose: the
/// orchestrator matches exhaustively and stays decoupled from any concrete
/// upstream's callback vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The upstream confirmed the session is live.
    Connected { viewer_count: u64 },
    /// The session ended upstream.
    Disconnected,
    /// A viewer comment.
    Comment { author: String, text: String },
}

/// Connects to one target's live stream. Connecting may fail or hang;
/// callers bound it with a timeout.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Open a session to `target`. Resolves once the upstream accepts the
    /// connection; the error text is what rate-limit classification will
    /// inspect.
    async fn connect(&self, target: &str) -> Result<Box<dyn StreamSession>>;
}

/// One open live session.
#[async_trait]
pub trait StreamSession: Send {
    /// Next event from the stream, `None` once the stream is exhausted.
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Best-effort, idempotent teardown.
    async fn disconnect(&mut self);
}

impl std::fmt::Debug for dyn StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamSession")
    }
}

/// Error-text fragments that mean "the upstream is throttling us" rather
/// than an ordinary connection failure. Matched case-insensitively.
pub const RATE_LIMIT_INDICATORS: &[&str] = &[
    "rate_limit",
    "rate limit",
    "too many requests",
    "429",
    "sign server",
    "rate_limit_ip_day",
    "euler",
    "blocked",
];

/// Classify an error message: does it look like a rate-limit signal?
pub fn is_rate_limit_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_indicators_match_case_insensitively() {
        assert!(is_rate_limit_error("HTTP 429 Too Many Requests"));
        assert!(is_rate_limit_error("Sign Server unavailable"));
        assert!(is_rate_limit_error("request BLOCKED by upstream"));
        assert!(is_rate_limit_error("rate_limit_ip_day exceeded"));
    }

    #[test]
    fn ordinary_failures_are_not_rate_limits() {
        assert!(!is_rate_limit_error("connection reset by peer"));
        assert!(!is_rate_limit_error("dns lookup failed"));
        assert!(!is_rate_limit_error("target is not live"));
    }
}
