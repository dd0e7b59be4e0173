//! Periodic sweep of expired and revoked refresh tokens.

use crate::auth::jwt_issuer::AccessTokenIssuer;
use crate::auth::refresh::RefreshTokenManager;
use crate::auth::storage::{RefreshTokenStore, UserDirectory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest sweep period; shorter requests are raised to it.
pub const MIN_CLEANUP_PERIOD: Duration = Duration::from_secs(1);

/// Background task calling [`RefreshTokenManager::cleanup`] on a fixed period.
///
/// The first sweep runs one full period after spawning. A failed sweep is
/// logged and retried on the next tick.
pub struct TokenCleanupTask {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TokenCleanupTask {
    /// Spawn the sweep on the current tokio runtime.
    ///
    /// A `period` below [`MIN_CLEANUP_PERIOD`] is raised to it.
    pub fn spawn<S, U, I>(manager: Arc<RefreshTokenManager<S, U, I>>, period: Duration) -> Self
    where
        S: RefreshTokenStore + 'static,
        U: UserDirectory + 'static,
        I: AccessTokenIssuer + 'static,
    {
        let period = if period < MIN_CLEANUP_PERIOD {
            tracing::warn!(
                target: "auth.token.cleanup",
                requested_ms = period.as_millis() as u64,
                "Cleanup period too short, using 1s"
            );
            MIN_CLEANUP_PERIOD
        } else {
            period
        };
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::debug!(
                target: "auth.token.cleanup",
                period_secs = period.as_secs(),
                "Token cleanup task started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.cleanup_now().await {
                            tracing::error!(
                                target: "auth.token.cleanup",
                                error = %e,
                                "Token cleanup failed"
                            );
                        }
                    }
                }
            }

            tracing::debug!(target: "auth.token.cleanup", "Token cleanup task stopped");
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// Spawn with the period from the manager's configuration.
    pub fn spawn_with_config<S, U, I>(manager: Arc<RefreshTokenManager<S, U, I>>) -> Self
    where
        S: RefreshTokenStore + 'static,
        U: UserDirectory + 'static,
        I: AccessTokenIssuer + 'static,
    {
        let period = manager.config().cleanup_interval();
        Self::spawn(manager, period)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}
