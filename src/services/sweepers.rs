//! Background sweepers.
//!
//! Each sweeper runs on its own timer and takes the same locks as request
//! handlers. Cancellation is only observed between sweeps; a sweep that
//! has started always runs to completion.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::{durable::DurableStore, sessions::SessionManager};

/// Spawn a background task that removes idle sessions every `interval`.
pub fn spawn_session_sweeper(
    sessions: SessionManager,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = sessions.sweep_idle().await;
            if removed > 0 {
                tracing::info!("Session sweep: removed {} idle sessions", removed);
            } else {
                tracing::debug!("Session sweep: no idle sessions");
            }
        }
        tracing::info!("Session sweeper stopped");
    })
}

/// Spawn a background task that purges expired durable pastes every `interval`.
pub fn spawn_expiry_sweeper(
    store: DurableStore,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match store.sweep_expired(chrono::Utc::now().timestamp()).await {
                Ok(count) if count > 0 => {
                    tracing::info!("Expiry sweep: purged {} expired pastes", count);
                }
                Ok(_) => tracing::debug!("Expiry sweep: no expired pastes"),
                Err(e) => tracing::error!("Expiry sweep failed: {}", e),
            }
        }
        tracing::info!("Expiry sweeper stopped");
    })
}
