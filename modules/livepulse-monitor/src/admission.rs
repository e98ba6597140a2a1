//! Admission gate: bounds simultaneous connection attempts with a permit
//! pool, spaces any two attempts process-wide by a floor interval, and adds
//! a small randomized delay before each connect so bulk reconnects don't
//! look machine-timed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use livepulse_common::MonitorConfig;

pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    /// Earliest instant the next attempt may start; reserving under the lock
    /// serializes concurrent admissions onto distinct slots.
    next_slot: Mutex<Instant>,
    min_interval: Duration,
    pre_delay_range: (u64, u64),
}

impl AdmissionGate {
    pub fn new(cfg: &MonitorConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(cfg.max_concurrent_connections)),
            next_slot: Mutex::new(Instant::now()),
            min_interval: cfg.min_connection_interval(),
            pre_delay_range: cfg.pre_connection_delay_secs,
        }
    }

    /// Acquire a connection permit, honoring the process-wide minimum
    /// interval and the pre-connection delay. Returns `None` on shutdown;
    /// the permit releases on drop, covering every exit path.
    pub async fn admit(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit.ok()?,
            _ = cancel.cancelled() => return None,
        };

        // Reserve the next attempt slot, then wait until it arrives.
        let wait = {
            let mut next = self
                .next_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.min_interval;
            slot - now
        };
        if !wait.is_zero() {
            tokio::select! {
                _ = sleep(wait) => {}
                _ = cancel.cancelled() => return None,
            }
        }

        let (lo, hi) = self.pre_delay_range;
        let pre_delay = Duration::from_millis(rand::rng().random_range(lo * 1000..=hi * 1000));
        tokio::select! {
            _ = sleep(pre_delay) => {}
            _ = cancel.cancelled() => return None,
        }

        Some(permit)
    }

    /// Permits currently available, for status reporting and tests.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
