use std::env;
use std::time::Duration;

/// Monitor configuration loaded from environment variables.
///
/// Every knob has a conservative default tuned for upstreams that silently
/// throttle bulk connections; overrides come from `LIVEPULSE_*` env vars.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base retry delay after the first failure, in seconds.
    pub base_delay_secs: u64,
    /// Hard cap on a single backoff delay, in seconds.
    pub max_delay_secs: u64,
    /// Exponential growth factor applied per consecutive failure.
    pub backoff_multiplier: f64,
    /// Jitter factor range applied to every backoff delay.
    pub jitter_range: (f64, f64),

    /// Fixed cooldown after repeated rate-limit signals, measured from the
    /// last successful connection, in seconds.
    pub rate_limit_cooldown_secs: u64,
    /// How long a single rate-limit signal blocks all targets, in seconds.
    pub global_rate_limit_secs: u64,
    /// How long a rate-limit signal blocks the offending target, in seconds.
    pub per_target_rate_limit_secs: u64,
    /// Consecutive rate-limit signals before the fixed cooldown kicks in.
    pub rate_limit_threshold: u32,

    /// Simultaneous in-flight connection attempts across all targets.
    pub max_concurrent_connections: usize,
    /// Floor delay between any two connection attempts process-wide, seconds.
    pub min_connection_interval_secs: u64,
    /// Randomized delay applied after permit acquisition and before the
    /// actual connect call, in seconds.
    pub pre_connection_delay_secs: (u64, u64),
    /// Bound on a single connect attempt, in seconds.
    pub connection_timeout_secs: u64,

    /// Poll interval while connected, also the shutdown-latency bound, seconds.
    pub idle_poll_secs: u64,
    /// Status reporter cadence, in seconds.
    pub report_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 15,
            max_delay_secs: 1800,
            backoff_multiplier: 2.0,
            jitter_range: (0.8, 1.2),
            rate_limit_cooldown_secs: 3600,
            global_rate_limit_secs: 1800,
            per_target_rate_limit_secs: 3600,
            rate_limit_threshold: 3,
            max_concurrent_connections: 2,
            min_connection_interval_secs: 5,
            pre_connection_delay_secs: (2, 5),
            connection_timeout_secs: 45,
            idle_poll_secs: 10,
            report_interval_secs: 60,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Panics with a clear message on
    /// malformed values.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_delay_secs: env_u64("LIVEPULSE_BASE_DELAY_SECS", d.base_delay_secs),
            max_delay_secs: env_u64("LIVEPULSE_MAX_DELAY_SECS", d.max_delay_secs),
            backoff_multiplier: env_f64("LIVEPULSE_BACKOFF_MULTIPLIER", d.backoff_multiplier),
            jitter_range: d.jitter_range,
            rate_limit_cooldown_secs: env_u64(
                "LIVEPULSE_RATE_LIMIT_COOLDOWN_SECS",
                d.rate_limit_cooldown_secs,
            ),
            global_rate_limit_secs: env_u64(
                "LIVEPULSE_GLOBAL_RATE_LIMIT_SECS",
                d.global_rate_limit_secs,
            ),
            per_target_rate_limit_secs: env_u64(
                "LIVEPULSE_PER_TARGET_RATE_LIMIT_SECS",
                d.per_target_rate_limit_secs,
            ),
            rate_limit_threshold: env_u64(
                "LIVEPULSE_RATE_LIMIT_THRESHOLD",
                d.rate_limit_threshold as u64,
            ) as u32,
            max_concurrent_connections: env_u64(
                "LIVEPULSE_MAX_CONCURRENT",
                d.max_concurrent_connections as u64,
            ) as usize,
            min_connection_interval_secs: env_u64(
                "LIVEPULSE_MIN_CONNECTION_INTERVAL_SECS",
                d.min_connection_interval_secs,
            ),
            pre_connection_delay_secs: d.pre_connection_delay_secs,
            connection_timeout_secs: env_u64(
                "LIVEPULSE_CONNECTION_TIMEOUT_SECS",
                d.connection_timeout_secs,
            ),
            idle_poll_secs: env_u64("LIVEPULSE_IDLE_POLL_SECS", d.idle_poll_secs),
            report_interval_secs: env_u64("LIVEPULSE_REPORT_INTERVAL_SECS", d.report_interval_secs),
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn min_connection_interval(&self) -> Duration {
        Duration::from_secs(self.min_connection_interval_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .map(|v| {
            v.parse()
                .unwrap_or_else(|_| panic!("{key} must be an integer, got '{v}'"))
        })
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .map(|v| {
            v.parse()
                .unwrap_or_else(|_| panic!("{key} must be a number, got '{v}'"))
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = MonitorConfig::default();
        assert!(cfg.base_delay_secs < cfg.max_delay_secs);
        assert!(cfg.backoff_multiplier > 1.0);
        assert!(cfg.jitter_range.0 < cfg.jitter_range.1);
        assert!(cfg.max_concurrent_connections >= 1);
        assert!(cfg.pre_connection_delay_secs.0 <= cfg.pre_connection_delay_secs.1);
    }
}
