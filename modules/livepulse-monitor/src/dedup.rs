//! Comment deduplication: per-target ledgers of recently seen dedup keys
//! with three detection strategies layered in order, plus the emptiness
//! filter for decorative-only messages.
//!
//! - Exact repeat: same author + verbatim trimmed text within 30s.
//! - Near duplicate: same author + NFC-normalized lowercased text within 10s.
//! - Rapid fire: a 4th comment from the same author within 5s, any content.
//!
//! Ledgers are bounded (prune on insert) and survive restarts via JSON
//! snapshots written by the status reporter and at shutdown.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Window for verbatim repeats from the same author.
const EXACT_WINDOW_SECS: i64 = 30;
/// Window for case/Unicode-normalized repeats (spam/bot floods).
const NEAR_WINDOW_SECS: i64 = 10;
/// Window for rapid-fire counting.
const RAPID_WINDOW_SECS: i64 = 5;
/// Prior comments from one author inside the rapid window before the next
/// one is suppressed regardless of content.
const RAPID_MAX_COMMENTS: usize = 3;
/// Ledger entries older than this are dropped during opportunistic pruning.
const RETENTION_SECS: i64 = 3600;
/// Hard cap per target; exceeded ledgers are cut back to the most recent half.
const LEDGER_CAP: usize = 1000;
const LEDGER_RETAIN: usize = 500;
/// Snapshot retention horizon.
const SNAPSHOT_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    last_seen: DateTime<Utc>,
    author: String,
}

/// Serialized form of all ledgers: target → dedup key → entry.
pub type DedupSnapshot = HashMap<String, HashMap<String, LedgerEntry>>;

/// Per-target dedup ledgers. One instance shared by all monitor loops
/// behind a mutex; the snapshot path needs a consistent view across targets.
#[derive(Debug, Default)]
pub struct Deduplicator {
    ledgers: HashMap<String, HashMap<String, LedgerEntry>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a comment is a duplicate, recording its keys when it
    /// is not. First matching strategy wins; acceptance records both the
    /// exact and normalized keys at `now` and then prunes the ledger.
    pub fn should_suppress(
        &mut self,
        target: &str,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let ledger = self.ledgers.entry(target.to_string()).or_default();

        let exact_key = exact_key(author, text);
        if let Some(entry) = ledger.get(&exact_key) {
            if now - entry.last_seen < Duration::seconds(EXACT_WINDOW_SECS) {
                return true;
            }
        }

        let near_key = near_key(author, text);
        if let Some(entry) = ledger.get(&near_key) {
            if now - entry.last_seen < Duration::seconds(NEAR_WINDOW_SECS) {
                return true;
            }
        }

        // Rapid fire: count prior accepted comments (one exact key each)
        // from this author inside the window.
        let recent_from_author = ledger
            .iter()
            .filter(|(key, entry)| {
                key.starts_with("e:")
                    && entry.author == author
                    && now - entry.last_seen < Duration::seconds(RAPID_WINDOW_SECS)
            })
            .count();
        if recent_from_author >= RAPID_MAX_COMMENTS {
            return true;
        }

        let entry = LedgerEntry {
            last_seen: now,
            author: author.to_string(),
        };
        ledger.insert(exact_key, entry.clone());
        ledger.insert(near_key, entry);

        Self::prune(ledger, now);
        false
    }

    fn prune(ledger: &mut HashMap<String, LedgerEntry>, now: DateTime<Utc>) {
        ledger.retain(|_, entry| now - entry.last_seen < Duration::seconds(RETENTION_SECS));

        if ledger.len() > LEDGER_CAP {
            let mut entries: Vec<_> = ledger.drain().collect();
            entries.sort_by_key(|(_, e)| std::cmp::Reverse(e.last_seen));
            entries.truncate(LEDGER_RETAIN);
            ledger.extend(entries);
        }
    }

    /// Serialize all ledgers, dropping entries past the 24h snapshot horizon.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> DedupSnapshot {
        let horizon = Duration::hours(SNAPSHOT_RETENTION_HOURS);
        self.ledgers
            .retain(|_, ledger| {
                ledger.retain(|_, entry| now - entry.last_seen < horizon);
                !ledger.is_empty()
            });
        self.ledgers.clone()
    }

    /// Restore ledgers from a prior snapshot.
    pub fn restore(snapshot: DedupSnapshot) -> Self {
        Self { ledgers: snapshot }
    }

    #[cfg(test)]
    fn ledger_len(&self, target: &str) -> usize {
        self.ledgers.get(target).map(|l| l.len()).unwrap_or(0)
    }
}

fn exact_key(author: &str, text: &str) -> String {
    format!("e:{:x}", key_hash(author, text.trim()))
}

fn near_key(author: &str, text: &str) -> String {
    let normalized: String = text.trim().to_lowercase().nfc().collect();
    format!("n:{:x}", key_hash(author, &normalized))
}

fn key_hash(author: &str, text: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    author.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

/// True when the text still contains something after stripping whitespace
/// and the pictographic/symbol blocks. Comments failing this are treated as
/// non-substantive and filtered with the same accounting as duplicates.
pub fn is_substantive(text: &str) -> bool {
    text.chars()
        .any(|c| !c.is_whitespace() && !is_decorative(c))
}

/// Fixed set of pictographic/symbol ranges: emoticons, pictographs,
/// transport symbols, flags, dingbats, enclosed characters, supplemental
/// symbols, and symbols extended-A.
fn is_decorative(c: char) -> bool {
    matches!(c,
        '\u{1F600}'..='\u{1F64F}'
        | '\u{1F300}'..='\u{1F5FF}'
        | '\u{1F680}'..='\u{1F6FF}'
        | '\u{1F1E0}'..='\u{1F1FF}'
        | '\u{2702}'..='\u{27B0}'
        | '\u{24C2}'..='\u{1F251}'
        | '\u{1F900}'..='\u{1F9FF}'
        | '\u{1FA70}'..='\u{1FAFF}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn exact_repeat_suppressed_within_window() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "hi", now));
        // 4 more identical sends inside 2s — all suppressed.
        for i in 1..5 {
            let ts = now + Duration::milliseconds(i * 400);
            assert!(dedup.should_suppress("t", "u1", "hi", ts), "send {i} got through");
        }
    }

    #[test]
    fn exact_repeat_allowed_after_window() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "hello there", now));
        let later = now + Duration::seconds(31);
        assert!(!dedup.should_suppress("t", "u1", "hello there", later));
    }

    #[test]
    fn near_duplicate_case_insensitive_within_window() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "Hi!!", now));
        let second = now + Duration::seconds(5);
        assert!(dedup.should_suppress("t", "u1", "hi!!", second));

        // Past the 10s near window (and the 30s exact window does not apply
        // since the casing differs).
        let third = now + Duration::seconds(16);
        assert!(!dedup.should_suppress("t", "u1", "HI!!", third));
    }

    #[test]
    fn rapid_fire_fourth_comment_suppressed() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let ts = now + Duration::milliseconds(i as i64 * 500);
            assert!(!dedup.should_suppress("t", "spammer", text, ts), "comment {i}");
        }
        let fourth = now + Duration::milliseconds(2000);
        assert!(dedup.should_suppress("t", "spammer", "four", fourth));
    }

    #[test]
    fn rapid_fire_does_not_cross_authors() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        for (i, author) in ["a", "b", "c", "d"].iter().enumerate() {
            let ts = now + Duration::milliseconds(i as i64 * 200);
            assert!(!dedup.should_suppress("t", author, "same text different author", ts));
        }
    }

    #[test]
    fn duplicates_do_not_cross_targets() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t1", "u1", "hi", now));
        assert!(!dedup.should_suppress("t2", "u1", "hi", now + Duration::seconds(1)));
    }

    #[test]
    fn ledger_capped_on_insert() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        // Each accept records two keys; spread timestamps so the rapid-fire
        // strategy never trips.
        for i in 0..520 {
            let ts = now + Duration::seconds(i * 6);
            dedup.should_suppress("t", &format!("author{i}"), &format!("text {i}"), ts);
        }
        assert!(
            dedup.ledger_len("t") <= LEDGER_CAP,
            "ledger exceeded cap: {}",
            dedup.ledger_len("t")
        );
    }

    #[test]
    fn old_entries_pruned() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "ancient", now));
        // Two hours later a new comment triggers pruning of the stale entry.
        let later = now + Duration::hours(2);
        assert!(!dedup.should_suppress("t", "u2", "fresh", later));
        assert_eq!(dedup.ledger_len("t"), 2);
    }

    #[test]
    fn snapshot_round_trip_preserves_decisions() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "persisted", now));
        let snapshot = dedup.snapshot(now);

        let mut restored = Deduplicator::restore(snapshot);
        let shortly_after = now + Duration::seconds(2);
        assert!(restored.should_suppress("t", "u1", "persisted", shortly_after));
        assert!(!restored.should_suppress("t", "u1", "novel", shortly_after));
    }

    #[test]
    fn snapshot_drops_entries_past_horizon() {
        let mut dedup = Deduplicator::new();
        let now = Utc::now();

        assert!(!dedup.should_suppress("t", "u1", "old", now));
        let later = now + Duration::hours(25);
        let snapshot = dedup.snapshot(later);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn emoji_only_text_is_not_substantive() {
        assert!(!is_substantive("🔥🔥🔥"));
        assert!(!is_substantive("  🚀 ✨  "));
        assert!(!is_substantive(""));
        assert!(!is_substantive("   \n\t"));
    }

    #[test]
    fn mixed_text_is_substantive() {
        assert!(is_substantive("nice stream 🔥"));
        assert!(is_substantive("gg"));
        assert!(is_substantive("?"));
    }
}
