//! Cooperative shutdown: one cancellation token observed by every loop,
//! set once by the signal listener (or programmatically in tests).

use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to every monitor loop and checked at each suspension
    /// point.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve on SIGINT or SIGTERM, then trigger shutdown. Spawned once by
    /// the process entry point.
    pub async fn listen_for_signals(self) {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, relying on Ctrl-C");
                    if ctrl_c.await.is_ok() {
                        info!("Received Ctrl-C, initiating graceful shutdown");
                    }
                    self.trigger();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("Received Ctrl-C, initiating graceful shutdown"),
                _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_ok() {
                info!("Received Ctrl-C, initiating graceful shutdown");
            }
        }

        self.trigger();
    }
}
