//! Retry delay policy: exponential backoff with jitter, plus the fixed
//! cooldown applied after repeated rate-limit signals.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use livepulse_common::MonitorConfig;

/// Cap on a single cooldown sleep so shutdown latency stays bounded even
/// when hours of cooldown remain.
pub const MAX_COOLDOWN_SLICE: Duration = Duration::from_secs(300);

/// Delay before the next connection attempt after `consecutive_failures`
/// failures: `min(base * multiplier^failures, cap)` scaled by a uniform
/// jitter factor so targets don't retry in lockstep.
pub fn next_delay(consecutive_failures: u32, cfg: &MonitorConfig) -> Duration {
    let jitter = rand::rng().random_range(cfg.jitter_range.0..=cfg.jitter_range.1);
    next_delay_with_jitter(consecutive_failures, cfg, jitter)
}

/// Deterministic inner computation; `jitter` is the factor that `next_delay`
/// draws from `cfg.jitter_range`.
pub fn next_delay_with_jitter(consecutive_failures: u32, cfg: &MonitorConfig, jitter: f64) -> Duration {
    let exponential =
        cfg.base_delay_secs as f64 * cfg.backoff_multiplier.powi(consecutive_failures as i32);
    let capped = exponential.min(cfg.max_delay_secs as f64);
    Duration::from_secs_f64(capped * jitter)
}

/// Remaining rate-limit cooldown once the consecutive-signal threshold is
/// reached, measured from the last successful connection. Returns `None`
/// when the cooldown does not apply or has elapsed; the returned slice is
/// capped at [`MAX_COOLDOWN_SLICE`] per iteration.
pub fn cooldown_slice(
    consecutive_rate_limits: u32,
    last_success: DateTime<Utc>,
    now: DateTime<Utc>,
    cfg: &MonitorConfig,
) -> Option<Duration> {
    if consecutive_rate_limits < cfg.rate_limit_threshold {
        return None;
    }
    let elapsed = (now - last_success).num_seconds().max(0) as u64;
    let remaining = cfg.rate_limit_cooldown_secs.checked_sub(elapsed)?;
    if remaining == 0 {
        return None;
    }
    Some(Duration::from_secs(remaining).min(MAX_COOLDOWN_SLICE))
}
