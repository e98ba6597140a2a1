//! Per-target monitoring loop: the connection/backoff state machine that
//! drives the external stream client, consults the shared rate-limit
//! windows and admission gate, and routes accepted events through the
//! deduplicator to the sink.
//!
//! One `TargetMonitor` per target, all running concurrently. Errors are
//! contained: nothing that happens inside one loop can take down another
//! loop or the process.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unicode_normalization::UnicodeNormalization;

use livepulse_common::{EventKind, LivePulseError, MonitorConfig, SinkRecord};

use crate::admission::AdmissionGate;
use crate::backoff;
use crate::client::{is_rate_limit_error, StreamClient, StreamEvent, StreamSession};
use crate::dedup::{is_substantive, Deduplicator};
use crate::rate_limit::RateLimitState;
use crate::sink::EventSink;
use crate::stats::StatsRegistry;

/// Delay after an unexpected loop error before the next iteration.
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Lifecycle of one monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Idle,
    /// Waiting out a backoff or cooldown window. `rate_limited` marks waits
    /// caused by an active rate-limit window rather than ordinary failure.
    Waiting { rate_limited: bool },
    Connecting,
    Connected,
    Disconnected,
    Stopped,
}

/// Shared pieces every monitor loop needs: the genuinely global state plus
/// the external collaborators, behind explicit synchronization.
pub struct MonitorDeps {
    pub config: MonitorConfig,
    pub client: Arc<dyn StreamClient>,
    pub sink: Arc<dyn EventSink>,
    pub dedup: Arc<Mutex<Deduplicator>>,
    pub rate_limits: Arc<Mutex<RateLimitState>>,
    pub gate: Arc<AdmissionGate>,
    pub stats: Arc<StatsRegistry>,
}

/// What one connection attempt concluded.
enum AttemptOutcome {
    Connected,
    Failed,
    RateLimited,
    Shutdown,
}

/// Owns all mutable per-target state; nothing else mutates it.
pub struct TargetMonitor {
    target: String,
    state: TargetState,
    consecutive_failures: u32,
    consecutive_rate_limits: u32,
    last_success: DateTime<Utc>,
    deps: Arc<MonitorDeps>,
    cancel: CancellationToken,
}

impl TargetMonitor {
    pub fn new(target: String, deps: Arc<MonitorDeps>, cancel: CancellationToken) -> Self {
        Self {
            target,
            state: TargetState::Idle,
            consecutive_failures: 0,
            consecutive_rate_limits: 0,
            last_success: Utc::now(),
            deps,
            cancel,
        }
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Run until shutdown, returning the terminal state. Every suspension
    /// point observes the cancellation token, so teardown latency is bounded
    /// by the idle poll interval.
    pub async fn run(mut self) -> TargetState {
        info!(target = self.target.as_str(), "Starting monitor loop");

        while !self.cancel.is_cancelled() {
            match self.iteration().await {
                Ok(()) => {}
                Err(e) => {
                    self.consecutive_failures += 1;
                    error!(
                        target = self.target.as_str(),
                        error = %e,
                        failures = self.consecutive_failures,
                        "Monitor iteration failed"
                    );
                    self.interruptible_sleep(ERROR_RETRY_DELAY).await;
                }
            }
        }

        self.state = TargetState::Stopped;
        info!(target = self.target.as_str(), "Stopped monitoring");
        self.state
    }

    async fn iteration(&mut self) -> anyhow::Result<()> {
        // Backoff wait after failures.
        if self.consecutive_failures > 0 {
            let delay = backoff::next_delay(self.consecutive_failures, &self.deps.config);
            self.state = TargetState::Waiting {
                rate_limited: false,
            };
            info!(
                target = self.target.as_str(),
                delay_secs = delay.as_secs(),
                failures = self.consecutive_failures,
                "Waiting before retry"
            );
            if !self.interruptible_sleep(delay).await {
                return Ok(());
            }
        }

        // Fixed cooldown after repeated rate-limit signals, sliced so a
        // shutdown request never waits behind a long sleep.
        let now = Utc::now();
        if let Some(slice) = backoff::cooldown_slice(
            self.consecutive_rate_limits,
            self.last_success,
            now,
            &self.deps.config,
        ) {
            self.state = TargetState::Waiting { rate_limited: true };
            info!(
                target = self.target.as_str(),
                slice_secs = slice.as_secs(),
                "Rate limit cooldown"
            );
            self.interruptible_sleep(slice).await;
            return Ok(());
        }

        match self.attempt_connection().await? {
            AttemptOutcome::Connected => {}
            AttemptOutcome::Failed => {
                self.consecutive_failures += 1;
            }
            AttemptOutcome::RateLimited => {
                self.consecutive_rate_limits += 1;
                self.consecutive_failures += 1;
            }
            AttemptOutcome::Shutdown => {}
        }
        Ok(())
    }

    /// One pass through WAITING → CONNECTING → CONNECTED. The admission
    /// permit is held only while CONNECTING and releases on every exit path.
    async fn attempt_connection(&mut self) -> anyhow::Result<AttemptOutcome> {
        let cfg = &self.deps.config;
        let now = Utc::now();

        // Pre-admission rate-limit gate: re-enter WAITING without consuming
        // a permit while a window is open.
        {
            let limits = lock(&self.deps.rate_limits);
            if limits.is_globally_limited(now) {
                let remaining = limits.global_remaining_secs(now);
                self.state = TargetState::Waiting { rate_limited: true };
                info!(
                    target = self.target.as_str(),
                    remaining_secs = remaining,
                    "Global rate limit active, holding off"
                );
                return Ok(AttemptOutcome::RateLimited);
            }
            if limits.is_target_limited(&self.target, now) {
                self.state = TargetState::Waiting { rate_limited: true };
                debug!(
                    target = self.target.as_str(),
                    "Per-target rate limit active, holding off"
                );
                return Ok(AttemptOutcome::RateLimited);
            }
        }

        let Some(permit) = self.deps.gate.admit(&self.cancel).await else {
            return Ok(AttemptOutcome::Shutdown);
        };

        self.state = TargetState::Connecting;
        self.deps.stats.record_attempt();
        info!(target = self.target.as_str(), "Connecting");

        let connect = tokio::select! {
            result = timeout(cfg.connection_timeout(), self.deps.client.connect(&self.target)) => result,
            _ = self.cancel.cancelled() => {
                drop(permit);
                return Ok(AttemptOutcome::Shutdown);
            }
        };
        drop(permit);

        let session = match connect {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Ok(self.classify_connect_error(&e));
            }
            Err(_) => {
                let e = anyhow::Error::from(LivePulseError::Timeout(cfg.connection_timeout_secs));
                return Ok(self.classify_connect_error(&e));
            }
        };

        self.on_connected().await;
        self.watch_session(session).await;
        Ok(AttemptOutcome::Connected)
    }

    /// Clients that signal rate limits explicitly are trusted; for the rest
    /// the signal is inferred from the error text. Anything else is an
    /// ordinary transient failure.
    fn classify_connect_error(&mut self, error: &anyhow::Error) -> AttemptOutcome {
        self.state = TargetState::Disconnected;
        self.deps.stats.record_failure();

        let message = error.to_string();
        let rate_limited = matches!(
            error.downcast_ref::<LivePulseError>(),
            Some(LivePulseError::RateLimited(_))
        ) || is_rate_limit_error(&message);

        if rate_limited {
            self.deps.stats.record_rate_limit_hit();
            let cfg = &self.deps.config;
            lock(&self.deps.rate_limits).record_rate_limit(
                &self.target,
                Utc::now(),
                Duration::from_secs(cfg.global_rate_limit_secs),
                Duration::from_secs(cfg.per_target_rate_limit_secs),
            );
            warn!(
                target = self.target.as_str(),
                error = message.as_str(),
                rate_limits = self.consecutive_rate_limits + 1,
                "Rate limit detected"
            );
            AttemptOutcome::RateLimited
        } else {
            debug!(
                target = self.target.as_str(),
                error = message.as_str(),
                failures = self.consecutive_failures + 1,
                "Connection failed, target may not be live"
            );
            AttemptOutcome::Failed
        }
    }

    async fn on_connected(&mut self) {
        self.state = TargetState::Connected;
        self.consecutive_failures = 0;
        self.consecutive_rate_limits = 0;
        self.last_success = Utc::now();
        self.deps.stats.connection_opened();
        info!(target = self.target.as_str(), "Connected to live stream");
        self.record_system_notice("Connected to live stream").await;
    }

    /// Consume session events in arrival order until the stream ends or
    /// shutdown is requested. Waits are bounded by the idle poll interval so
    /// a quiet stream still re-checks the shutdown flag.
    async fn watch_session(&mut self, mut session: Box<dyn StreamSession>) {
        loop {
            let polled = tokio::select! {
                polled = timeout(self.deps.config.idle_poll(), session.next_event()) => polled,
                _ = self.cancel.cancelled() => {
                    session.disconnect().await;
                    break;
                }
            };

            let event = match polled {
                Ok(event) => event,
                // Idle poll elapsed with no event; loop around.
                Err(_) => continue,
            };

            match event {
                Some(StreamEvent::Connected { viewer_count }) => {
                    debug!(
                        target = self.target.as_str(),
                        viewer_count, "Stream session confirmed"
                    );
                }
                Some(StreamEvent::Comment { author, text }) => {
                    self.handle_comment(&author, &text).await;
                }
                Some(StreamEvent::Disconnected) | None => {
                    session.disconnect().await;
                    info!(target = self.target.as_str(), "Stream ended, will retry");
                    break;
                }
            }
        }

        self.deps.stats.connection_closed();
        self.state = TargetState::Disconnected;
        self.record_system_notice("Disconnected from live stream").await;
    }

    /// Dedup before forward, never after: the decision must be made while
    /// the event is still in arrival order.
    async fn handle_comment(&mut self, author: &str, text: &str) {
        let author: String = author.nfc().collect();
        let text: String = text.nfc().collect();
        let now = Utc::now();

        if !is_substantive(&text) {
            self.deps.stats.record_duplicate();
            return;
        }

        let suppress = lock(&self.deps.dedup).should_suppress(&self.target, &author, &text, now);
        if suppress {
            self.deps.stats.record_duplicate();
            return;
        }

        let record = SinkRecord {
            target: self.target.clone(),
            kind: EventKind::Comment,
            author: author.clone(),
            text: text.clone(),
            timestamp: now,
        };
        match self.deps.sink.record(&record).await {
            Ok(()) => {
                self.deps.stats.record_comment(now);
                let preview: String = text.chars().take(100).collect();
                debug!(
                    target = self.target.as_str(),
                    author = author.as_str(),
                    comment = preview.as_str(),
                    "Captured comment"
                );
            }
            Err(e) => {
                error!(
                    target = self.target.as_str(),
                    error = %e,
                    "Failed to persist comment"
                );
            }
        }
    }

    /// Connection lifecycle notices bypass deduplication.
    async fn record_system_notice(&self, text: &str) {
        let record = SinkRecord {
            target: self.target.clone(),
            kind: EventKind::System,
            author: "monitor".to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.deps.sink.record(&record).await {
            error!(
                target = self.target.as_str(),
                error = %e,
                "Failed to persist system notice"
            );
        }
    }

    /// Sleep that wakes immediately on shutdown. Returns false if shutdown
    /// interrupted the wait.
    async fn interruptible_sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }
}

/// Shared-state locks are held briefly and never across awaits; a poisoned
/// lock only means another loop panicked mid-update, so keep going with
/// whatever state it left.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
