//! Shared rate-limit windows: a single global cooldown deadline plus one
//! deadline per target. Every monitor loop consults this before a
//! connection attempt; any loop that observes a rate-limit signal extends
//! the windows.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Cooldown deadlines shared by all monitor loops. Callers hold this behind
/// a mutex; the operations themselves are pure state transitions.
#[derive(Debug, Default)]
pub struct RateLimitState {
    global_until: Option<DateTime<Utc>>,
    per_target: HashMap<String, DateTime<Utc>>,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the global cooldown window is open.
    pub fn is_globally_limited(&self, now: DateTime<Utc>) -> bool {
        self.global_until.is_some_and(|until| now < until)
    }

    /// True while `target` has an open per-target window.
    pub fn is_target_limited(&self, target: &str, now: DateTime<Utc>) -> bool {
        self.per_target
            .get(target)
            .is_some_and(|until| now < *until)
    }

    /// Seconds until the global window closes, zero when it is not open.
    pub fn global_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        self.global_until
            .map(|until| (until - now).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// How many targets currently have an open per-target window.
    pub fn limited_target_count(&self, now: DateTime<Utc>) -> usize {
        self.per_target.values().filter(|until| now < **until).count()
    }

    /// Record a rate-limit signal observed while connecting to `target`.
    ///
    /// Extends both windows with max() semantics: a repeated signal never
    /// shortens an active window, so this is idempotent under signal floods.
    pub fn record_rate_limit(
        &mut self,
        target: &str,
        now: DateTime<Utc>,
        global_duration: Duration,
        per_target_duration: Duration,
    ) {
        let global_until = now + global_duration;
        self.global_until = Some(match self.global_until {
            Some(existing) => existing.max(global_until),
            None => global_until,
        });

        let target_until = now + per_target_duration;
        self.per_target
            .entry(target.to_string())
            .and_modify(|existing| *existing = (*existing).max(target_until))
            .or_insert(target_until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const GLOBAL: Duration = Duration::from_secs(1800);
    const PER_TARGET: Duration = Duration::from_secs(3600);

    #[test]
    fn fresh_state_is_unlimited() {
        let state = RateLimitState::new();
        let now = Utc::now();
        assert!(!state.is_globally_limited(now));
        assert!(!state.is_target_limited("a", now));
        assert_eq!(state.limited_target_count(now), 0);
    }

    #[test]
    fn signal_opens_both_windows_and_isolates_targets() {
        let mut state = RateLimitState::new();
        let now = Utc::now();
        state.record_rate_limit("a", now, GLOBAL, PER_TARGET);

        assert!(state.is_globally_limited(now));
        assert!(state.is_target_limited("a", now));
        assert!(!state.is_target_limited("b", now));
        assert_eq!(state.limited_target_count(now), 1);
    }

    #[test]
    fn windows_close_after_their_durations() {
        let mut state = RateLimitState::new();
        let now = Utc::now();
        state.record_rate_limit("a", now, GLOBAL, PER_TARGET);

        let after_global = now + ChronoDuration::seconds(1801);
        assert!(!state.is_globally_limited(after_global));
        assert!(state.is_target_limited("a", after_global));

        let after_target = now + ChronoDuration::seconds(3601);
        assert!(!state.is_target_limited("a", after_target));
    }

    #[test]
    fn repeated_signals_never_shrink_a_window() {
        let mut state = RateLimitState::new();
        let now = Utc::now();
        state.record_rate_limit("a", now, GLOBAL, PER_TARGET);

        // A later, shorter signal must not pull the deadlines in.
        let later = now + ChronoDuration::seconds(10);
        state.record_rate_limit("a", later, Duration::from_secs(1), Duration::from_secs(1));

        let probe = now + ChronoDuration::seconds(1000);
        assert!(state.is_globally_limited(probe));
        assert!(state.is_target_limited("a", probe));
    }

    #[test]
    fn later_signal_extends_the_window() {
        let mut state = RateLimitState::new();
        let now = Utc::now();
        state.record_rate_limit("a", now, GLOBAL, PER_TARGET);

        let later = now + ChronoDuration::seconds(600);
        state.record_rate_limit("a", later, GLOBAL, PER_TARGET);

        // Past the first deadline but inside the extended one.
        let probe = now + ChronoDuration::seconds(2000);
        assert!(state.is_globally_limited(probe));
    }

    #[test]
    fn global_remaining_reports_seconds() {
        let mut state = RateLimitState::new();
        let now = Utc::now();
        assert_eq!(state.global_remaining_secs(now), 0);
        state.record_rate_limit("a", now, GLOBAL, PER_TARGET);
        assert_eq!(state.global_remaining_secs(now), 1800);
    }
}
