//! Periodic eviction of lapsed in-process sessions.
//!
//! Lookups already ignore expired entries; this only bounds memory held by
//! identities that never come back.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::MemorySessionStore;

pub fn spawn_session_janitor(
    store: Arc<MemorySessionStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Session janitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = store.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = store.len(), "Purged lapsed sessions");
            }
        }

        tracing::info!("Session janitor stopped");
    })
}
